use std::sync::{Arc, Mutex};
use std::vec::Vec;

use proptest::prelude::*;
use proptest::test_runner::TestCaseResult;

use crate::config::TimerParams;
use crate::testing::{leak, Bench};
use crate::tick::Tick;

const HORIZON: u32 = 300;
const MAX_TIMERS: usize = 7;

#[derive(Debug, Clone)]
struct TimerPlan {
    timeout: u32,
    period: u32,
    arm_at: u32,
}

#[derive(Debug, Clone)]
struct Scenario {
    timers: Vec<TimerPlan>,
    /// Ticks during which the timer interrupt is held off.
    held: Vec<bool>,
    /// Ticks after which the deferred work runs without a wakeup.
    spurious: Vec<bool>,
}

fn timer_strategy() -> impl Strategy<Value = TimerPlan> {
    (
        1u32..200,
        prop_oneof![2 => Just(0u32), 3 => 1u32..20],
        prop_oneof![Just(0u32), 0u32..60],
    )
        .prop_map(|(timeout, period, arm_at)| TimerPlan {
            timeout,
            period,
            arm_at,
        })
}

fn scenario_strategy() -> impl Strategy<Value = Scenario> {
    let ticks = HORIZON as usize + 1;
    (
        prop::collection::vec(timer_strategy(), 1..=MAX_TIMERS),
        prop::collection::vec(prop::bool::weighted(0.1), ticks),
        prop::collection::vec(prop::bool::weighted(0.05), ticks),
    )
        .prop_map(|(timers, mut held, spurious)| {
            // everything due by the horizon gets serviced
            held[HORIZON as usize] = false;
            Scenario {
                timers,
                held,
                spurious,
            }
        })
}

/// Every `(tick, timer)` expiry the service should report: each deadline
/// fires on the first tick at or after it that takes interrupts.
fn expected_fires(scenario: &Scenario) -> Vec<(u32, usize)> {
    let first_open = |from: u32| (from..=HORIZON).find(|&t| !scenario.held[t as usize]);
    let mut fires = Vec::new();
    for (index, plan) in scenario.timers.iter().enumerate() {
        let mut deadline = plan.arm_at + plan.timeout;
        while deadline <= HORIZON {
            if let Some(tick) = first_open(deadline) {
                fires.push((tick, index));
            }
            if plan.period == 0 {
                break;
            }
            deadline += plan.period;
        }
    }
    fires.sort_unstable();
    fires
}

fn run_scenario(scenario: &Scenario) -> TestCaseResult {
    let bench = Bench::new();
    let clock = bench.clock;
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut timers = Vec::new();
    let mut last = clock.ticks();

    for tick in 0..=HORIZON {
        let t = tick as u64;
        if scenario.held[tick as usize] {
            bench.jump_through(t);
        } else {
            bench.jump_to(t * bench.period);
            bench.deliver();
            bench.run_through(t);
            if scenario.spurious[tick as usize] {
                clock.deferred_work();
            }
        }

        for (index, plan) in scenario.timers.iter().enumerate() {
            if plan.arm_at != tick {
                continue;
            }
            let sink = log.clone();
            let callback = leak(move || {
                sink.lock()
                    .unwrap()
                    .push((clock.system_ticks().raw(), index))
            });
            let params = TimerParams {
                period: plan.period,
                start: true,
            };
            timers.push(clock.construct(callback, plan.timeout, &params).unwrap());
        }

        let schedule = clock.schedule();
        prop_assert!(!schedule.ticks.precedes(last, Tick::ZERO));
        prop_assert!(schedule.skip <= schedule.max_skippable);
        last = schedule.ticks;
    }

    let mut fired = log.lock().unwrap().clone();
    fired.sort_unstable();
    prop_assert_eq!(fired, expected_fires(scenario));

    for timer in timers {
        clock.destruct(timer);
    }
    prop_assert_eq!(clock.registered(), 0);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_timers_fire_on_their_deadlines(scenario in scenario_strategy()) {
        run_scenario(&scenario)?;
    }
}
