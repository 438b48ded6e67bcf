//! Host-side test bench: a simulated RTC, a recording port, and helpers to
//! drive a [`Clock`] through simulated time.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::vec::Vec;

use crate::arch::{CounterDevice, Port};
use crate::clock::Clock;
use crate::config::{ClockParams, COMPARE_SHIFT};
use crate::queue::Callback;

/// Shared state of the simulated RTC.
#[derive(Default)]
pub(crate) struct SimHw {
    count: AtomicU64,
    compare: AtomicU32,
    /// A compare value was written and has not matched yet.
    compare_set: AtomicBool,
    compare_enabled: AtomicBool,
    /// Latched match flag, cleared by `clear_event`.
    event: AtomicBool,
    /// Counts added after every read, for code that spins on the counter.
    step: AtomicU64,
}

impl SimHw {
    pub fn new() -> Arc<SimHw> {
        Arc::new(SimHw::default())
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn set_count(&self, count: u64) {
        self.count.store(count, Ordering::SeqCst);
    }

    pub fn set_auto_step(&self, counts: u64) {
        self.step.store(counts, Ordering::SeqCst);
    }

    /// The outstanding compare value.
    pub fn compare(&self) -> Option<u32> {
        self.compare_set
            .load(Ordering::SeqCst)
            .then(|| self.compare.load(Ordering::SeqCst))
    }

    pub fn compare_enabled(&self) -> bool {
        self.compare_enabled.load(Ordering::SeqCst)
    }

    pub fn event_pending(&self) -> bool {
        self.event.load(Ordering::SeqCst)
    }

    /// Count at which the outstanding compare matches, if it lies ahead.
    pub fn next_match(&self) -> Option<u64> {
        let compare = self.compare()?;
        let units = self.count() >> COMPARE_SHIFT;
        let delta = compare.wrapping_sub(units as u32);
        if delta == 0 || delta > 0x8000_0000 {
            return None;
        }
        Some((units + delta as u64) << COMPARE_SHIFT)
    }

    fn fire(&self) {
        self.compare_set.store(false, Ordering::SeqCst);
        self.event.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct SimCounter(Arc<SimHw>);

impl SimCounter {
    pub fn new(hw: Arc<SimHw>) -> SimCounter {
        SimCounter(hw)
    }
}

impl CounterDevice for SimCounter {
    fn count64(&self) -> u64 {
        let step = self.0.step.load(Ordering::SeqCst);
        self.0.count.fetch_add(step, Ordering::SeqCst)
    }

    fn set_compare(&mut self, value: u32) {
        self.0.compare.store(value, Ordering::SeqCst);
        self.0.compare_set.store(true, Ordering::SeqCst);
    }

    fn enable_compare(&mut self) {
        self.0.compare_enabled.store(true, Ordering::SeqCst);
    }

    fn clear_event(&mut self) {
        self.0.event.store(false, Ordering::SeqCst);
    }
}

type IdleHook = Box<dyn Fn() + Send + Sync>;

/// Records posted work instead of running it.
#[derive(Default)]
pub(crate) struct SimPort {
    work: AtomicBool,
    posts: AtomicU32,
    idle_hook: OnceLock<IdleHook>,
}

impl SimPort {
    pub fn take_work(&self) -> bool {
        self.work.swap(false, Ordering::SeqCst)
    }

    pub fn posts(&self) -> u32 {
        self.posts.load(Ordering::SeqCst)
    }
}

impl Port for SimPort {
    fn post_work(&self) {
        self.work.store(true, Ordering::SeqCst);
        self.posts.fetch_add(1, Ordering::SeqCst);
    }

    fn idle(&self) {
        let hook = self.idle_hook.get().expect("idle called without a hook");
        hook();
    }
}

pub(crate) type SimClock = Clock<SimCounter, SimPort, 8>;

/// A started clock on a simulated RTC.
#[derive(Clone)]
pub(crate) struct Bench {
    pub hw: Arc<SimHw>,
    pub clock: &'static SimClock,
    /// Device counts per tick.
    pub period: u64,
}

impl Bench {
    /// 1 ms ticks, counter at zero.
    pub fn new() -> Bench {
        Bench::at_tick(1000, 0)
    }

    /// A clock with `tick_period_us` ticks, started at the beginning of `tick`.
    pub fn at_tick(tick_period_us: u32, tick: u64) -> Bench {
        let hw = SimHw::new();
        let clock: &'static SimClock = Box::leak(Box::new(Clock::new(
            SimCounter::new(hw.clone()),
            SimPort::default(),
            ClockParams::with_tick_period(tick_period_us),
        )));
        let period = (1u64 << 32) * tick_period_us as u64 / 1_000_000;
        hw.set_count(tick * period);
        clock.startup();
        Bench { hw, clock, period }
    }

    /// Tick the counter is in right now.
    pub fn now_tick(&self) -> u32 {
        (self.hw.count() / self.period) as u32
    }

    /// Advance the counter to `target`, servicing every compare match on
    /// the way as soon as it happens.
    pub fn run_to(&self, target: u64) {
        loop {
            match self.hw.next_match() {
                Some(at) if at <= target => {
                    self.hw.set_count(at);
                    self.hw.fire();
                    self.interrupt();
                }
                _ => {
                    self.hw.set_count(target);
                    return;
                }
            }
        }
    }

    /// Run through the last count of virtual tick `tick`.
    pub fn run_through(&self, tick: u64) {
        self.run_to((tick + 1) * self.period - 1);
    }

    /// Advance the counter with interrupts held off: a match on the way
    /// stays latched until [`deliver`](Self::deliver).
    pub fn jump_to(&self, target: u64) {
        if matches!(self.hw.next_match(), Some(at) if at <= target) {
            self.hw.fire();
        }
        self.hw.set_count(target);
    }

    pub fn jump_through(&self, tick: u64) {
        self.jump_to((tick + 1) * self.period - 1);
    }

    /// Take a latched match, if any.
    pub fn deliver(&self) {
        if self.hw.event_pending() {
            self.interrupt();
        }
    }

    /// The timer ISR followed by the deferred work it posted.
    pub fn interrupt(&self) {
        self.clock.timer_interrupt();
        if self.clock.port().take_work() {
            self.clock.deferred_work();
        }
    }

    /// Make `Port::idle` run simulated time through the next tick.
    pub fn install_idle(&self) {
        let bench = self.clone();
        let hook: IdleHook = Box::new(move || bench.run_through(bench.now_tick() as u64 + 1));
        if self.clock.port().idle_hook.set(hook).is_err() {
            panic!("idle hook installed twice");
        }
    }

    /// A callback appending the live tick to a shared log on every call.
    pub fn recorder(&self) -> (Arc<Mutex<Vec<u32>>>, Callback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let clock = self.clock;
        let callback = leak(move || sink.lock().unwrap().push(clock.system_ticks().raw()));
        (log, callback)
    }
}

/// Promote a closure to a `'static` callback.
pub(crate) fn leak<F: Fn() + Sync + 'static>(f: F) -> Callback {
    Box::leak(Box::new(f))
}

pub(crate) fn snapshot(log: &Mutex<Vec<u32>>) -> Vec<u32> {
    log.lock().unwrap().clone()
}
