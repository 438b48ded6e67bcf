//! # Hardware Timer Driver
//!
//! Turns one free-running [`CounterDevice`] with a single compare channel
//! into a source of virtual ticks.
//!
//! ## Fixed-Point Period
//!
//! The device counts in units of 2^-32 s, so one virtual tick of
//! `period_us` microseconds is `2^32 * period_us / 1_000_000` counts. The
//! fraction is dropped; instead of letting it accumulate, the driver keeps a
//! *drift anchor*, the count of the last latched tick boundary (always a
//! whole multiple of the period), and measures every wakeup from it.
//!
//! ```text
//!   count ──┬──────────┬──────────┬──────────┬─────►
//!           │  period  │  period  │  period  │
//!         anchor    anchor+p   anchor+2p  anchor+3p = next threshold
//!                                             └─ arm(3)
//! ```
//!
//! ## Compare Programming
//!
//! Thresholds are 64-bit counts; the device only sees bits 47..16. The
//! compare value is rounded up, so the match never lands in the tick before
//! the one that was asked for. A target that is already behind the counter,
//! or closer than [`COMPARE_MARGIN`], is pushed forward to
//! `now + COMPARE_MARGIN`.

use crate::arch::CounterDevice;
use crate::config::{COMPARE_MARGIN, COMPARE_SHIFT, MAX_SKIP, RTC_FREQ_HZ};
use crate::tick::Tick;

/// Half of the 32-bit compare range; targets further away count as "past".
const HALF_RANGE: u32 = 0x8000_0000;

/// Whether [`HwTimer::init`] starts the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartMode {
    /// Start immediately after construction.
    Auto,
    /// The owner calls [`HwTimer::start`].
    User,
}

/// The hardware timer driver.
pub struct HwTimer<D> {
    device: D,
    period_us: u32,
    /// Device counts per virtual tick.
    period: u64,
    /// Drift anchor: count of the last latched tick boundary.
    saved_count: u64,
    prev_threshold: u64,
    next_threshold: u64,
}

impl<D: CounterDevice> HwTimer<D> {
    /// Build the driver without touching the device.
    ///
    /// # Panics
    /// If `period_us` is zero.
    pub const fn new(device: D, period_us: u32) -> Self {
        assert!(period_us > 0, "tick period must be non-zero");
        HwTimer {
            device,
            period_us,
            period: (1u64 << 32) * period_us as u64 / 1_000_000,
            saved_count: 0,
            prev_threshold: 0,
            next_threshold: 0,
        }
    }

    /// Build the driver and, for [`StartMode::Auto`], start the device.
    pub fn init(device: D, period_us: u32, mode: StartMode) -> Self {
        let mut timer = Self::new(device, period_us);
        if mode == StartMode::Auto {
            let _ = timer.start();
        }
        timer
    }

    /// Latch the anchor, program a wakeup one tick ahead and enable the
    /// compare event. Returns the latched tick.
    pub fn start(&mut self) -> Tick {
        let tick = self.current_tick(true);
        self.prev_threshold = self.saved_count;
        self.next_threshold = self.saved_count + self.period;
        self.set_threshold(self.next_threshold);
        self.device.clear_event();
        self.device.enable_compare();
        debug!(
            "timer: started at tick {}, period {} counts",
            tick,
            self.period
        );
        tick
    }

    /// Forget the drift anchor. The device itself keeps running.
    pub fn stop(&mut self) {
        self.saved_count = 0;
    }

    /// Most ticks that may be skipped in one wait.
    pub fn max_skippable(&self) -> u32 {
        let ticks = MAX_SKIP / self.period;
        if ticks > u32::MAX as u64 {
            u32::MAX
        } else {
            ticks as u32
        }
    }

    /// The current virtual tick.
    ///
    /// With `save`, the count is rounded down to a whole number of periods
    /// and becomes the anchor for the next [`arm`](Self::arm). Latch once
    /// per service, not on every query.
    pub fn current_tick(&mut self, save: bool) -> Tick {
        let count = self.device.count64();
        let tick = Tick::from_raw((count / self.period) as u32);
        if save {
            self.saved_count = count - count % self.period;
        }
        tick
    }

    /// Wake `delta` ticks after the anchor.
    pub fn arm(&mut self, delta: u32) {
        let threshold = self.saved_count + delta as u64 * self.period;
        self.prev_threshold = self.next_threshold;
        self.next_threshold = threshold;
        self.set_threshold(threshold);
    }

    /// Acknowledge the compare event.
    pub fn clear_event(&mut self) {
        self.device.clear_event();
    }

    /// Rate of the compare unit in Hz.
    pub const fn frequency(&self) -> u32 {
        RTC_FREQ_HZ
    }

    /// Raw device count in 2^-32 s units.
    pub fn count64(&self) -> u64 {
        self.device.count64()
    }

    /// Device counts per virtual tick.
    pub const fn period(&self) -> u64 {
        self.period
    }

    /// Virtual tick length in microseconds.
    pub const fn period_us(&self) -> u32 {
        self.period_us
    }

    /// Threshold programmed by the latest `arm`/`start`, and the one before.
    pub const fn thresholds(&self) -> (u64, u64) {
        (self.prev_threshold, self.next_threshold)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Program `threshold` into the compare register, keeping clear of the
    /// counter.
    fn set_threshold(&mut self, threshold: u64) {
        let round = (1u64 << COMPARE_SHIFT) - 1;
        let mut next = ((threshold + round) >> COMPARE_SHIFT) as u32;
        let now = self.device.compare_count();

        if next.wrapping_sub(now) > HALF_RANGE {
            // already behind the counter
            next = now.wrapping_add(COMPARE_MARGIN);
        } else if next.wrapping_sub(now) < COMPARE_MARGIN {
            next = now.wrapping_add(COMPARE_MARGIN);
        }

        self.device.set_compare(next);
        trace!("timer: compare {} (now {})", next, now);
    }
}
