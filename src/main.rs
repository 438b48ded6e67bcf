//! # Tickless Demo Firmware
//!
//! Runs the clock service on the CC26xx AON RTC with 1 ms virtual ticks:
//!
//! | Timer | Kind | Timeout | Behavior |
//! |-------|------|---------|----------|
//! | `heartbeat` | Periodic | 500 ticks | Counts beats |
//! | `ready` | One-shot | 250 ticks | Posts the `READY` semaphore |
//!
//! The main loop pends on `READY`, re-arms the one-shot and then sleeps a
//! second at a time. Between expiries the RTC is programmed straight to the
//! next deadline, so the core sits in `wfi` instead of taking an interrupt
//! every millisecond.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::{entry, exception};
use panic_halt as _;

use tickless::arch::cc26xx::{self, AonRtc, PendSvPort};
use tickless::{Clock, ClockParams, PendStatus, Semaphore, TimerParams};

static CLOCK: Clock<AonRtc, PendSvPort> = Clock::new(
    // SAFETY: the only `AonRtc` in the firmware.
    unsafe { AonRtc::new() },
    PendSvPort,
    ClockParams::with_tick_period(1000),
);

static BEATS: AtomicU32 = AtomicU32::new(0);
static READY: Semaphore = Semaphore::binary(false);

fn heartbeat() {
    BEATS.fetch_add(1, Ordering::Relaxed);
}

fn ready() {
    READY.post();
}

static HEARTBEAT: fn() = heartbeat;
static READY_CALLBACK: fn() = ready;

// ---------------------------------------------------------------------------
// Exception handlers
// ---------------------------------------------------------------------------

#[exception]
fn PendSV() {
    CLOCK.deferred_work();
}

#[exception]
unsafe fn DefaultHandler(irqn: i16) {
    if irqn == 4 {
        CLOCK.timer_interrupt();
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

#[entry]
fn main() -> ! {
    cc26xx::configure_interrupts();

    let _heartbeat = CLOCK
        .construct(&HEARTBEAT, 500, &TimerParams::periodic(500))
        .expect("Failed to create heartbeat timer");
    let ready = CLOCK
        .construct(&READY_CALLBACK, 250, &TimerParams::one_shot())
        .expect("Failed to create ready timer");

    loop {
        match READY.pend(&CLOCK, 1000) {
            Ok(PendStatus::Posted) => {
                let _ = CLOCK.start(ready.id());
            }
            Ok(PendStatus::TimedOut) | Err(_) => {}
        }
        let _ = CLOCK.sleep(1);
        let _beats = BEATS.load(Ordering::Relaxed);
    }
}
