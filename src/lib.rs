//! # Tickless: Dynamic-Tick Virtual Timer Service
//!
//! A clock service for the CC13xx/CC26xx always-on RTC that multiplexes any
//! number of logical one-shot and periodic timers onto a single hardware
//! compare channel.
//!
//! ## Overview
//!
//! A conventional system tick interrupts the CPU every period whether or not
//! anything is due. This service keeps a *virtual* tick counter instead and
//! programs the RTC to wake only when the soonest timer expires, skipping
//! every tick in between. Virtual time stays exact across the skip: on each
//! wakeup the service walks the arena forward tick by tick, firing whatever
//! fell due, before choosing the next skip window.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                 Application / Callbacks                 │
//! ├────────────────────────────────────────────────────────┤
//! │   Timer API (handle.rs)        Blocking (sleep.rs)     │
//! │   construct · start · stop     Semaphore · sleep_ticks │
//! ├────────────────────────────────────────────────────────┤
//! │              Clock Service (clock.rs)                   │
//! │   timer_interrupt() · deferred_work() · arm / cancel   │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Timer Arena │   Virtual Ticks    │  Sync Primitives  │
//! │  queue.rs    │   tick.rs          │  sync.rs          │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │          Hardware Timer Driver (timer.rs)               │
//! │   drift anchor · compare rounding · skip limit          │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cc26xx.rs)                   │
//! │   AON RTC channel 0 · PendSV deferred work · wfi idle  │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory Model
//!
//! - **No heap**: the clock, its arena and every timer live in a `static`
//! - **Fixed-size arena**: `[Slot; N]`, `N` defaulting to `MAX_TIMERS`
//! - **Critical sections**: all shared state sits behind a
//!   `critical_section::Mutex`; callbacks run with interrupts enabled
//!
//! ## Logging
//!
//! With the `defmt` feature the service logs through `defmt`; without it
//! the logging macros compile to nothing.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod arch;
pub mod clock;
pub mod config;
pub mod error;
pub mod handle;
pub mod queue;
pub mod sleep;
pub mod sync;
pub mod tick;
pub mod timer;

#[cfg(test)]
mod proptests;
#[cfg(test)]
mod testing;

pub use clock::{Clock, Schedule};
pub use config::{ClockParams, TimerParams, WAIT_FOREVER};
pub use error::ClockError;
pub use handle::{OwnedTimer, Timer};
pub use queue::{Callback, TimerId};
pub use sleep::{PendStatus, Semaphore};
pub use tick::{Tick, TickDelta};
pub use timer::{HwTimer, StartMode};
