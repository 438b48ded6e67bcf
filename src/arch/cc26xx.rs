//! # CC26xx Port Layer
//!
//! Hardware-specific code for the CC13xx/CC26xx always-on RTC and the
//! Cortex-M4F core it sits next to.
//!
//! ## AON RTC
//!
//! The RTC runs from the 32 kHz low-frequency clock and never stops, even
//! in standby. Its 64-bit count is split over two registers:
//!
//! ```text
//!   63            32 31            16 15             0
//!  ┌────────────────┬────────────────┬────────────────┐
//!  │      SEC       │   SUBSEC[31:16] │ SUBSEC[15:0]  │
//!  └────────────────┴────────────────┴────────────────┘
//!           │ 15..0 │◄── CH0CMP / TIME (32 bits) ──►│
//! ```
//!
//! Channel 0 compares against bits 47..16, i.e. at 65 536 Hz.
//!
//! ## Deferred Work
//!
//! The timer interrupt posts the clock service's deferred work through
//! PendSV, which is configured at the lowest exception priority so it only
//! runs once every hardware interrupt handler has returned.

use cortex_m::interrupt::InterruptNumber;

use super::{CounterDevice, Port};

// ---------------------------------------------------------------------------
// Register map
// ---------------------------------------------------------------------------

const AON_RTC_BASE: usize = 0x4009_2000;

const CTL: usize = 0x00;
const EVFLAGS: usize = 0x04;
const SEC: usize = 0x08;
const SUBSEC: usize = 0x0C;
const CHCTL: usize = 0x14;
const CH0CMP: usize = 0x18;
const SYNC: usize = 0x2C;
const TIME: usize = 0x30;

const CTL_EN: u32 = 1 << 0;
const CTL_COMB_EV_CH0: u32 = 1 << 16;
const EVFLAGS_CH0: u32 = 1 << 0;
const CHCTL_CH0_EN: u32 = 1 << 0;

/// NVIC line of the combined AON RTC event (`INT_AON_RTC_COMB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AonRtcIrq;

// SAFETY: 4 is the AON_RTC_COMB line on every CC13x2/CC26x2 part.
unsafe impl InterruptNumber for AonRtcIrq {
    fn number(self) -> u16 {
        4
    }
}

// ---------------------------------------------------------------------------
// AON RTC counter
// ---------------------------------------------------------------------------

/// Channel 0 of the AON RTC.
pub struct AonRtc {
    base: usize,
}

impl AonRtc {
    /// # Safety
    /// There must be only one `AonRtc`; it owns channel 0 and the combined
    /// event routing.
    pub const unsafe fn new() -> AonRtc {
        AonRtc { base: AON_RTC_BASE }
    }

    #[inline]
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `offset` is one of the register offsets above, inside the
        // AON RTC block owned by `self`.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write(&mut self, offset: usize, value: u32) {
        // SAFETY: as for `read`.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    /// Wait for writes to cross into the AON domain.
    #[inline]
    fn sync(&self) {
        let _ = self.read(SYNC);
    }
}

impl CounterDevice for AonRtc {
    fn count64(&self) -> u64 {
        // SEC may roll over between the two reads; retry until it is stable.
        loop {
            let sec = self.read(SEC);
            let subsec = self.read(SUBSEC);
            if self.read(SEC) == sec {
                return ((sec as u64) << 32) | subsec as u64;
            }
        }
    }

    fn compare_count(&self) -> u32 {
        self.read(TIME)
    }

    fn set_compare(&mut self, value: u32) {
        self.write(CH0CMP, value);
        self.sync();
    }

    /// Enables channel 0, routes it onto the combined event and makes
    /// sure the counter runs.
    fn enable_compare(&mut self) {
        let chctl = self.read(CHCTL);
        self.write(CHCTL, chctl | CHCTL_CH0_EN);
        let ctl = self.read(CTL);
        self.write(CTL, ctl | CTL_EN | CTL_COMB_EV_CH0);
        self.sync();
    }

    fn clear_event(&mut self) {
        self.write(EVFLAGS, EVFLAGS_CH0);
        self.sync();
    }
}

// ---------------------------------------------------------------------------
// PendSV port
// ---------------------------------------------------------------------------

/// Runs the deferred timer work from PendSV and idles with `wfi`.
///
/// The application's PendSV handler must call
/// [`Clock::deferred_work`](crate::clock::Clock::deferred_work).
#[derive(Debug, Default, Clone, Copy)]
pub struct PendSvPort;

impl Port for PendSvPort {
    #[inline]
    fn post_work(&self) {
        cortex_m::peripheral::SCB::set_pendsv();
    }

    #[inline]
    fn idle(&self) {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// Interrupt priority configuration
// ---------------------------------------------------------------------------

/// Put PendSV at the lowest priority and unmask the RTC interrupt.
///
/// The RTC line keeps its reset priority (highest), so the compare event
/// always preempts the deferred work it posts.
pub fn configure_interrupts() {
    // SAFETY: single read-modify-write of SHPR3 during init; PendSV priority
    // lives in bits [23:16].
    unsafe {
        let shpr3: *mut u32 = 0xE000_ED20 as *mut u32;
        let val = core::ptr::read_volatile(shpr3);
        core::ptr::write_volatile(shpr3, val | (0xFF << 16));
        cortex_m::peripheral::NVIC::unmask(AonRtcIrq);
    }
}
