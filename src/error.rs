//! Errors reported by the clock service.

/// Why a clock operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// Every timer slot is in use.
    #[error("timer arena is full")]
    QueueFull,
    /// The timer was destructed; its slot may already belong to another timer.
    #[error("timer handle no longer refers to a live timer")]
    StaleTimer,
}
