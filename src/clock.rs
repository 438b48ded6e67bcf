//! # Dynamic-Tick Clock Service
//!
//! Multiplexes any number of logical timers (up to the arena capacity) onto
//! the single compare channel of the [hardware timer driver](crate::timer).
//! Instead of interrupting every tick, the service programs the hardware to
//! wake exactly when the soonest timer is due, or as far ahead as the
//! hardware allows when nothing is pending.
//!
//! ## Interrupt / Deferred Work Split
//!
//! ```text
//!   RTC match ──► timer_interrupt()          (ISR: clear event, post work)
//!                     │
//!                     ▼
//!               deferred_work()              (PendSV / software interrupt)
//!                 1. latch now, flag in_work_func      ┐ interrupts off
//!                 2. spurious wake? re-arm and return  ┘
//!                 3. walk the arena tick by tick,      ┐ interrupts on,
//!                    firing due callbacks              ┘ one slot at a time
//!                 4. re-walk if a timer was armed      ┐
//!                 5. pick the skip window              │ interrupts off
//!                 6. program the hardware              ┘
//! ```
//!
//! ## Virtual Time
//!
//! `ticks` is the last tick the service walked to; it only moves inside the
//! deferred work. `next_scheduled` is the tick the hardware will wake at.
//! The walk always starts from `next_scheduled`: nothing can be due between
//! the two, because the skip window never reaches past the soonest deadline
//! and any timer armed with an earlier deadline pulls `next_scheduled` in.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;

use crate::arch::{CounterDevice, Port};
use crate::config::{ClockParams, MAX_TIMERS};
use crate::error::ClockError;
use crate::queue::{TimerId, TimerQueue, Visit};
use crate::sync::IrqGuard;
use crate::tick::{Tick, TickDelta};
use crate::timer::HwTimer;

// ---------------------------------------------------------------------------
// Scheduling state
// ---------------------------------------------------------------------------

/// Everything shared between thread context, the ISR and the deferred work.
pub(crate) struct State<D, const N: usize> {
    pub timer: HwTimer<D>,
    pub queue: TimerQueue<N>,
    /// Last tick the deferred work has walked to.
    pub ticks: Tick,
    /// Tick the hardware is programmed to wake at.
    pub next_scheduled: Tick,
    /// Ticks the hardware was told to skip to reach `next_scheduled`.
    pub num_tick_skip: u32,
    pub max_skippable: u32,
    pub in_work_func: bool,
    /// A timer was armed while `in_work_func` was set.
    pub start_during_work_func: bool,
    /// At least one real wakeup has been serviced.
    pub ticking: bool,
    pub initialized: bool,
}

/// Snapshot of the scheduling state, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Schedule {
    /// Last serviced virtual tick.
    pub ticks: Tick,
    /// Tick the hardware will wake at.
    pub next_scheduled: Tick,
    /// Current skip window.
    pub skip: u32,
    pub max_skippable: u32,
    pub ticking: bool,
}

/// Arena tag handed to the next clock that starts. `0` marks an unbound
/// arena.
static NEXT_OWNER: Mutex<Cell<u16>> = Mutex::new(Cell::new(1));

fn next_owner() -> u16 {
    crate::sync::critical_section(|cs| {
        let next = NEXT_OWNER.borrow(cs);
        let owner = next.get();
        next.set(owner.checked_add(1).unwrap_or(1));
        owner
    })
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// The clock service.
///
/// `Clock::new` is `const`, so the clock can live in a `static`; the
/// hardware is only touched by [`startup`](Self::startup), which every
/// constructor calls on first use.
pub struct Clock<D, P, const N: usize = MAX_TIMERS> {
    state: Mutex<RefCell<State<D, N>>>,
    port: P,
    params: ClockParams,
}

impl<D: CounterDevice, P: Port, const N: usize> Clock<D, P, N> {
    /// # Panics
    /// If `params.tick_period_us` is zero.
    pub const fn new(device: D, port: P, params: ClockParams) -> Self {
        Clock {
            state: Mutex::new(RefCell::new(State {
                timer: HwTimer::new(device, params.tick_period_us),
                queue: TimerQueue::new(),
                ticks: Tick::ZERO,
                next_scheduled: Tick::ZERO,
                num_tick_skip: 0,
                max_skippable: 0,
                in_work_func: false,
                start_during_work_func: false,
                ticking: false,
                initialized: false,
            })),
            port,
            params,
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn params(&self) -> &ClockParams {
        &self.params
    }

    /// Run `f` on the shared state with interrupts disabled.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut State<D, N>) -> R) -> R {
        let guard = IrqGuard::new();
        let mut state = self.state.borrow_ref_mut(guard.token());
        f(&mut state)
    }

    /// Start the hardware timer. Later calls do nothing.
    pub fn startup(&self) {
        self.with_state(|s| {
            if s.initialized {
                return;
            }
            s.queue.bind(next_owner());
            let now = s.timer.start();
            s.ticks = now;
            s.next_scheduled = now + 1;
            s.num_tick_skip = 1;
            s.max_skippable = s.timer.max_skippable();
            s.initialized = true;
            info!(
                "clock: started at tick {}, period {} us, max skip {}",
                now,
                self.params.tick_period_us,
                s.max_skippable
            );
        });
    }

    // -----------------------------------------------------------------------
    // Arming
    // -----------------------------------------------------------------------

    /// Arm `id` to expire `timeout` ticks from now; `None` reuses the
    /// timer's stored timeout.
    ///
    /// Re-arming from the deferred work for the tick the timer just fired
    /// on moves the deadline to the following tick.
    pub(crate) fn arm(&self, id: TimerId, timeout: Option<u32>) -> Result<(), ClockError> {
        self.with_state(|s| {
            let timeout = match timeout {
                Some(timeout) => {
                    s.queue.get_mut(id)?.timeout = timeout;
                    timeout
                }
                None => s.queue.get(id)?.timeout,
            };

            // Outside the deferred work the anchor is latched so the
            // hardware can be reprogrammed from it.
            let direct = s.ticking && !s.in_work_func;
            let in_work = s.in_work_func;
            let now = s.timer.current_tick(direct);
            let mut deadline = now + timeout;

            let obj = s.queue.get_mut(id)?;
            if in_work && obj.last_fired == Some(deadline) {
                // a timer expires at most once per tick
                deadline += TickDelta::new(1);
            }
            obj.curr_timeout = deadline;
            obj.active = true;

            if direct {
                // Measured from `now`: a wakeup already behind us is
                // about to be serviced and is never beaten.
                let until_wake = (s.next_scheduled - now).ticks();
                let overdue = until_wake > s.num_tick_skip;
                if !overdue && timeout < until_wake {
                    let skip = timeout.min(s.max_skippable);
                    s.timer.arm(skip);
                    s.next_scheduled = now + skip;
                    s.num_tick_skip = skip;
                    trace!("clock: {} pulls wakeup in to {}", id, deadline);
                }
            } else if in_work {
                s.start_during_work_func = true;
            }
            Ok(())
        })
    }

    /// Take `id` out of due-date computation. It stays registered.
    pub(crate) fn cancel(&self, id: TimerId) -> Result<(), ClockError> {
        self.with_state(|s| {
            s.queue.get_mut(id)?.active = false;
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Interrupt and deferred work
    // -----------------------------------------------------------------------

    /// Timer ISR body: acknowledge the match and post the deferred work.
    pub fn timer_interrupt(&self) {
        self.with_state(|s| s.timer.clear_event());
        self.port.post_work();
    }

    /// Service the timer arena. Runs once per posted wakeup, outside
    /// interrupt context.
    pub fn deferred_work(&self) {
        let Some((mut service_tick, mut ticks_to_service)) = self.begin_service() else {
            return;
        };

        let mut distance = Some(TickDelta::ZERO);
        loop {
            while let Some(step) = distance.filter(|d| *d <= ticks_to_service) {
                service_tick += step;
                ticks_to_service = ticks_to_service.saturating_sub(step);
                distance = self.walk_queue(service_tick);
            }

            let Some(due) = self.finish_service(service_tick, ticks_to_service, distance) else {
                break;
            };
            distance = Some(due);
        }
    }

    /// Steps 1 and 2: latch "now" and decide whether there is anything to do.
    ///
    /// Returns the first tick to walk and how far "now" lies beyond it.
    fn begin_service(&self) -> Option<(Tick, TickDelta)> {
        self.with_state(|s| {
            if !s.initialized {
                return None;
            }
            let now = s.timer.current_tick(true);
            s.in_work_func = true;
            s.start_during_work_func = false;

            // Until the first wakeup, timers armed at start-up may be due
            // before `next_scheduled`.
            let service_tick = if s.ticking { s.next_scheduled } else { s.ticks };

            let service_delta = service_tick - s.ticks;
            let now_delta = now - s.ticks;
            if service_delta > now_delta {
                // woke before the scheduled tick; the match is spent, so
                // program it again for the rest of the window
                let remaining = service_delta.saturating_sub(now_delta).ticks();
                s.timer.arm(remaining);
                s.in_work_func = false;
                debug!("clock: early wake at {}, {} ticks to go", now, remaining);
                return None;
            }

            Some((service_tick, now - service_tick))
        })
    }

    /// Step 3, one pass: fire everything due on `this_tick` and return the
    /// distance to the soonest deadline still pending.
    fn walk_queue(&self, this_tick: Tick) -> Option<TickDelta> {
        let mut distance = None;
        let mut index = 0;
        loop {
            let delta = match self.with_state(|s| s.queue.visit(index, this_tick)) {
                Visit::End => break,
                Visit::Idle => None,
                Visit::Pending(delta) => Some(delta),
                Visit::Due(callback) => {
                    callback();
                    self.with_state(|s| s.queue.pending_delta(index, this_tick))
                }
            };
            distance = soonest(distance, delta);
            index += 1;
        }
        distance
    }

    /// Steps 4 to 6. Returns `Some(distance)` when a timer armed during the
    /// walk is already due and the walk must continue.
    fn finish_service(
        &self,
        service_tick: Tick,
        ticks_to_service: TickDelta,
        mut distance: Option<TickDelta>,
    ) -> Option<TickDelta> {
        self.with_state(|s| {
            if s.start_during_work_func {
                s.start_during_work_func = false;
                distance = s.queue.next_distance(service_tick);
                if let Some(due) = distance.filter(|d| *d <= ticks_to_service) {
                    return Some(due);
                }
            }

            let skip = match distance {
                None => s.max_skippable,
                Some(distance) => distance
                    .saturating_sub(ticks_to_service)
                    .ticks()
                    .min(s.max_skippable),
            };

            let now = service_tick + ticks_to_service;
            s.timer.arm(skip);
            s.num_tick_skip = skip;
            s.next_scheduled = now + skip;
            s.ticking = true;
            s.in_work_func = false;
            s.ticks = service_tick;
            trace!("clock: serviced {}, next wake {}", service_tick, s.next_scheduled);
            None
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The virtual tick counter: the last tick the service walked to.
    pub fn ticks(&self) -> Tick {
        self.with_state(|s| s.ticks)
    }

    /// The live tick, read from the hardware without latching.
    pub fn system_ticks(&self) -> Tick {
        self.with_state(|s| s.timer.current_tick(false))
    }

    /// Ticks until the programmed wakeup, or zero once it is overdue.
    pub fn ticks_until_interrupt(&self) -> u32 {
        self.with_state(|s| {
            let current = s.timer.current_tick(false);
            let remaining = (s.next_scheduled - current).ticks();
            if remaining > s.num_tick_skip {
                0
            } else {
                remaining
            }
        })
    }

    pub fn schedule(&self) -> Schedule {
        self.with_state(|s| Schedule {
            ticks: s.ticks,
            next_scheduled: s.next_scheduled,
            skip: s.num_tick_skip,
            max_skippable: s.max_skippable,
            ticking: s.ticking,
        })
    }

    /// Timers currently registered.
    pub fn registered(&self) -> usize {
        self.with_state(|s| s.queue.len())
    }

    /// Largest skip window the hardware supports.
    pub fn max_skippable(&self) -> u32 {
        self.with_state(|s| s.timer.max_skippable())
    }

    pub fn cpu_freq(&self) -> u32 {
        self.params.cpu_freq_hz
    }

    /// Virtual tick period in microseconds.
    pub fn system_tick_period(&self) -> u32 {
        self.params.tick_period_us
    }

    /// Rate of the underlying compare unit in Hz.
    pub fn timer_frequency(&self) -> u32 {
        self.with_state(|s| s.timer.frequency())
    }

    /// Raw hardware count in 2^-32 s units.
    pub fn count64(&self) -> u64 {
        self.with_state(|s| s.timer.count64())
    }
}

fn soonest(a: Option<TickDelta>, b: Option<TickDelta>) -> Option<TickDelta> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
