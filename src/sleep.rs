//! # Blocking Helpers
//!
//! A counting semaphore whose pend times out on an ordinary one-shot timer,
//! and the sleep calls built on it. Waiting threads park in
//! [`Port::idle`] with interrupts disabled, so a wakeup that lands between
//! the check and the idle is never lost: the pending interrupt makes `idle`
//! return at once.

use core::cell::Cell;

use critical_section::Mutex;

use crate::arch::{CounterDevice, Port};
use crate::clock::Clock;
use crate::config::{TimerParams, WAIT_FOREVER};
use crate::error::ClockError;
use crate::sync::{self, IrqGuard};

/// How a [`Semaphore::pend`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendStatus {
    Posted,
    TimedOut,
}

/// Counting semaphore, safe to post from callbacks and interrupts.
pub struct Semaphore {
    count: Mutex<Cell<u32>>,
    max: u32,
}

impl Semaphore {
    pub const fn new(initial: u32) -> Semaphore {
        Semaphore {
            count: Mutex::new(Cell::new(initial)),
            max: u32::MAX,
        }
    }

    /// Count saturates at one.
    pub const fn binary(initial: bool) -> Semaphore {
        Semaphore {
            count: Mutex::new(Cell::new(initial as u32)),
            max: 1,
        }
    }

    pub fn post(&self) {
        sync::critical_section(|cs| {
            let count = self.count.borrow(cs);
            if count.get() < self.max {
                count.set(count.get() + 1);
            }
        });
    }

    /// Take one count without blocking.
    pub fn try_take(&self) -> bool {
        sync::critical_section(|cs| {
            let count = self.count.borrow(cs);
            match count.get() {
                0 => false,
                n => {
                    count.set(n - 1);
                    true
                }
            }
        })
    }

    pub fn count(&self) -> u32 {
        sync::critical_section(|cs| self.count.borrow(cs).get())
    }

    /// Block until a count is available or `timeout` ticks pass.
    ///
    /// `0` polls once; [`WAIT_FOREVER`] never times out. Any other timeout
    /// occupies one arena slot for the duration of the wait.
    pub fn pend<D: CounterDevice, P: Port, const N: usize>(
        &self,
        clock: &Clock<D, P, N>,
        timeout: u32,
    ) -> Result<PendStatus, ClockError> {
        if self.try_take() {
            return Ok(PendStatus::Posted);
        }
        if timeout == 0 {
            return Ok(PendStatus::TimedOut);
        }

        let expiry = match timeout {
            WAIT_FOREVER => None,
            ticks => Some(clock.create(&EXPIRE, ticks, &TimerParams::one_shot())?),
        };

        loop {
            let _guard = IrqGuard::new();
            if self.try_take() {
                return Ok(PendStatus::Posted);
            }
            if let Some(timer) = &expiry {
                if !clock.is_active(timer.id()) {
                    return Ok(PendStatus::TimedOut);
                }
            }
            clock.port().idle();
        }
    }
}

fn expire() {}

/// Callback of pend timeouts; the waiter polls the timer's state instead.
static EXPIRE: fn() = expire;

impl<D: CounterDevice, P: Port, const N: usize> Clock<D, P, N> {
    /// Block the caller for `ticks` virtual ticks.
    pub fn sleep_ticks(&self, ticks: u32) -> Result<(), ClockError> {
        if ticks == 0 {
            return Ok(());
        }
        let ticks = ticks.min(WAIT_FOREVER - 1);
        Semaphore::new(0).pend(self, ticks).map(|_| ())
    }

    /// Block the caller for `seconds`, rounded to whole ticks.
    pub fn sleep(&self, seconds: u32) -> Result<(), ClockError> {
        let mut ticks = seconds as u64 * 1_000_000 / self.system_tick_period() as u64;
        while ticks > 0 {
            let chunk = ticks.min((WAIT_FOREVER - 1) as u64);
            self.sleep_ticks(chunk as u32)?;
            ticks -= chunk;
        }
        Ok(())
    }

    /// Block the caller for `us` microseconds.
    ///
    /// Below one tick this spins on the raw counter; otherwise it sleeps
    /// for the covering number of ticks.
    pub fn usleep(&self, us: u32) -> Result<(), ClockError> {
        let period_us = self.system_tick_period();
        if us >= period_us {
            return self.sleep_ticks(us.div_ceil(period_us));
        }

        let counts = (1u64 << 32) * us as u64 / 1_000_000;
        let start = self.count64();
        while self.count64().wrapping_sub(start) < counts {
            core::hint::spin_loop();
        }
        Ok(())
    }
}
