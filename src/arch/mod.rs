//! # Architecture Abstraction Layer
//!
//! Provides the hardware abstraction boundary for the clock service: the
//! raw counter/compare device behind the hardware timer driver, and the
//! port hooks used to leave interrupt context. Currently implements the
//! CC26xx AON RTC on Cortex-M4F; extensible to other parts by adding
//! sibling modules.

pub mod cc26xx;

/// A free-running counter with one compare channel.
///
/// The count is expressed in units of 2^-32 s: seconds in the upper word,
/// sub-seconds in the lower word. The compare register holds bits 47..16 of
/// that count (see [`COMPARE_SHIFT`](crate::config::COMPARE_SHIFT)).
pub trait CounterDevice {
    /// The full 64-bit count.
    fn count64(&self) -> u64;

    /// The current count expressed in compare-register units.
    fn compare_count(&self) -> u32 {
        (self.count64() >> crate::config::COMPARE_SHIFT) as u32
    }

    /// Program the compare register.
    fn set_compare(&mut self, value: u32);

    /// Route compare matches to the timer interrupt.
    fn enable_compare(&mut self);

    /// Acknowledge a compare match.
    fn clear_event(&mut self);
}

/// Host hooks the clock service needs beyond the counter itself.
pub trait Port {
    /// Schedule [`Clock::deferred_work`](crate::clock::Clock::deferred_work)
    /// to run once, outside interrupt context, ahead of any other deferred
    /// work. Called from the timer interrupt.
    fn post_work(&self);

    /// Wait for the next interrupt.
    ///
    /// Called by blocked threads with interrupts disabled; must return once
    /// an interrupt is pending, even if it has not been taken yet.
    fn idle(&self);
}
