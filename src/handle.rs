//! # Timer Objects
//!
//! Public lifecycle and control of logical timers.
//!
//! A timer is created with [`Clock::construct`], which hands back a
//! [`Timer`] token owning the slot until [`Clock::destruct`] consumes it.
//! [`Clock::create`] wraps the token in an [`OwnedTimer`] guard that
//! destructs on drop. Control operations take a copyable [`TimerId`], so a
//! callback may start or stop any timer, itself included.
//!
//! ```text
//!   construct ──► Timer ──id()──► TimerId ──► start / stop / set_timeout …
//!       │           │
//!       │           └──► destruct
//!       └─ create ──► OwnedTimer ──drop──► destruct
//! ```

use core::ops::Deref;

use crate::arch::{CounterDevice, Port};
use crate::clock::Clock;
use crate::config::TimerParams;
use crate::error::ClockError;
use crate::queue::{Callback, TimerId, TimerObject};

/// Owning token for a registered timer.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timer {
    id: TimerId,
}

impl Timer {
    pub fn id(&self) -> TimerId {
        self.id
    }
}

/// A [`Timer`] that destructs itself when dropped.
pub struct OwnedTimer<'c, D: CounterDevice, P: Port, const N: usize> {
    clock: &'c Clock<D, P, N>,
    timer: Option<Timer>,
}

impl<D: CounterDevice, P: Port, const N: usize> OwnedTimer<'_, D, P, N> {
    pub fn id(&self) -> TimerId {
        match &self.timer {
            Some(timer) => timer.id(),
            None => unreachable!("owned timer used after release"),
        }
    }

    /// Give up ownership without destructing.
    pub fn into_inner(mut self) -> Timer {
        match self.timer.take() {
            Some(timer) => timer,
            None => unreachable!("owned timer used after release"),
        }
    }
}

impl<D: CounterDevice, P: Port, const N: usize> Deref for OwnedTimer<'_, D, P, N> {
    type Target = Clock<D, P, N>;

    fn deref(&self) -> &Self::Target {
        self.clock
    }
}

impl<D: CounterDevice, P: Port, const N: usize> Drop for OwnedTimer<'_, D, P, N> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            self.clock.destruct(timer);
        }
    }
}

impl<D: CounterDevice, P: Port, const N: usize> Clock<D, P, N> {
    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Register a timer and, if `params.start` is set, arm it.
    ///
    /// Starts the clock service on first use.
    pub fn construct(
        &self,
        callback: Callback,
        timeout: u32,
        params: &TimerParams,
    ) -> Result<Timer, ClockError> {
        self.startup();
        let id = self.with_state(|s| {
            s.queue
                .insert(TimerObject::new(callback, timeout, params.period))
        })?;
        debug!("clock: timer {} registered, timeout {}", id, timeout);
        if params.start {
            self.arm(id, None)?;
        }
        Ok(Timer { id })
    }

    /// [`construct`](Self::construct) with a guard that destructs on drop.
    pub fn create(
        &self,
        callback: Callback,
        timeout: u32,
        params: &TimerParams,
    ) -> Result<OwnedTimer<'_, D, P, N>, ClockError> {
        let timer = self.construct(callback, timeout, params)?;
        Ok(OwnedTimer {
            clock: self,
            timer: Some(timer),
        })
    }

    /// Register an inactive one-shot timer.
    pub fn add(&self, callback: Callback, timeout: u32) -> Result<Timer, ClockError> {
        self.construct(callback, timeout, &TimerParams::DEFAULT)
    }

    /// Stop and unregister a timer.
    pub fn destruct(&self, timer: Timer) {
        match self.with_state(|s| s.queue.remove(timer.id)) {
            Ok(_) => debug!("clock: timer {} destructed", timer.id),
            Err(_) => warn!("clock: timer {} belongs to another clock", timer.id),
        }
    }

    pub fn delete(&self, timer: OwnedTimer<'_, D, P, N>) {
        drop(timer);
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    /// Arm with the stored timeout.
    pub fn start(&self, id: TimerId) -> Result<(), ClockError> {
        self.arm(id, None)
    }

    /// Arm with a new timeout, which is also stored.
    pub fn start_with(&self, id: TimerId, timeout: u32) -> Result<(), ClockError> {
        self.arm(id, Some(timeout))
    }

    pub fn stop(&self, id: TimerId) -> Result<(), ClockError> {
        self.cancel(id)
    }

    /// Change the timeout used by the next start. A running timer keeps its
    /// current deadline.
    pub fn set_timeout(&self, id: TimerId, timeout: u32) -> Result<(), ClockError> {
        self.with_state(|s| {
            s.queue.get_mut(id)?.timeout = timeout;
            Ok(())
        })
    }

    /// Ticks until expiry while active, the stored timeout otherwise.
    pub fn timeout(&self, id: TimerId) -> Result<u32, ClockError> {
        self.with_state(|s| {
            let obj = *s.queue.get(id)?;
            if !obj.active {
                return Ok(obj.timeout);
            }
            let now = s.timer.current_tick(false);
            if obj.curr_timeout.precedes(now, s.ticks) {
                // due but not yet serviced
                Ok(0)
            } else {
                Ok((obj.curr_timeout - now).ticks())
            }
        })
    }

    /// Change the re-arm interval. `0` turns the timer into a one-shot.
    pub fn set_period(&self, id: TimerId, period: u32) -> Result<(), ClockError> {
        self.with_state(|s| {
            s.queue.get_mut(id)?.period = period;
            Ok(())
        })
    }

    pub fn period(&self, id: TimerId) -> Result<u32, ClockError> {
        self.with_state(|s| Ok(s.queue.get(id)?.period))
    }

    /// `false` for stale ids.
    pub fn is_active(&self, id: TimerId) -> bool {
        self.with_state(|s| s.queue.get(id).map(|obj| obj.active).unwrap_or(false))
    }
}
