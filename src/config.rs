//! # Tickless Configuration
//!
//! Compile-time constants governing the clock service and the RTC port,
//! plus the small runtime parameter structs handed to [`Clock::new`] and
//! to timer construction. All limits are fixed at compile time; there is
//! no dynamic allocation.
//!
//! [`Clock::new`]: crate::clock::Clock::new

/// Default number of timer objects a [`Clock`](crate::clock::Clock) can
/// hold. Each slot costs a few words of RAM; the arena never grows.
pub const MAX_TIMERS: usize = 16;

/// Default virtual tick period in microseconds.
///
/// Smaller periods give finer timeouts. Because the service skips ticks,
/// a short period does not translate into more interrupts.
pub const TICK_PERIOD_US: u32 = 10;

/// CPU core clock in Hz (CC26x2 runs from the 48 MHz HF oscillator).
pub const CPU_FREQ_HZ: u32 = 48_000_000;

/// Rate at which the RTC compare register advances (SUBSEC bits 31..16).
pub const RTC_FREQ_HZ: u32 = 65_536;

/// Position of the compare register inside the 64-bit RTC count.
///
/// The count is in units of 2^-32 s; the compare register holds bits 47..16.
pub const COMPARE_SHIFT: u32 = 16;

/// Minimum distance, in compare units, between "now" and a programmed
/// compare value. Anything closer might be missed by the hardware.
pub const COMPARE_MARGIN: u32 = 4;

/// Longest wait, in raw 2^-32 s counts, the driver will program: 32 400 s.
///
/// Keeps every compare target within half of the 32-bit compare range so
/// that "in the past" and "in the future" stay distinguishable.
pub const MAX_SKIP: u64 = 0x7E90_0000_0000;

/// Pend timeout meaning "never time out".
pub const WAIT_FOREVER: u32 = u32::MAX;

/// Parameters for a [`Clock`](crate::clock::Clock).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockParams {
    /// Virtual tick period in microseconds. Must be non-zero.
    pub tick_period_us: u32,
    /// Reported by `Clock::cpu_freq`.
    pub cpu_freq_hz: u32,
}

impl ClockParams {
    pub const DEFAULT: ClockParams = ClockParams {
        tick_period_us: TICK_PERIOD_US,
        cpu_freq_hz: CPU_FREQ_HZ,
    };

    /// Defaults with a different tick period.
    pub const fn with_tick_period(tick_period_us: u32) -> ClockParams {
        ClockParams {
            tick_period_us,
            ..Self::DEFAULT
        }
    }
}

impl Default for ClockParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Parameters for a single timer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerParams {
    /// Re-arm interval in ticks. `0` makes the timer one-shot.
    pub period: u32,
    /// Arm the timer as part of construction.
    pub start: bool,
}

impl TimerParams {
    pub const DEFAULT: TimerParams = TimerParams {
        period: 0,
        start: false,
    };

    /// A periodic timer that starts on construction.
    pub const fn periodic(period: u32) -> TimerParams {
        TimerParams {
            period,
            start: true,
        }
    }

    /// A one-shot timer that starts on construction.
    pub const fn one_shot() -> TimerParams {
        TimerParams {
            period: 0,
            start: true,
        }
    }
}

impl Default for TimerParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}
