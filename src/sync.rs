//! # Synchronization Primitives
//!
//! Interrupt-safe critical section abstractions. All shared clock state
//! must be accessed within a critical section to prevent data races between
//! thread context, the timer interrupt and the deferred timer work.
//!
//! On Cortex-M the `critical-section` implementation comes from
//! `cortex-m`'s `critical-section-single-core` feature (PRIMASK save and
//! restore); host tests link the `std` implementation instead.

use critical_section::{CriticalSection, RestoreState};

/// Interrupts held off for as long as the guard lives.
///
/// The previous interrupt state is restored when the guard is dropped, on
/// every exit path, so guards nest and early returns cannot leave
/// interrupts masked.
pub struct IrqGuard {
    restore: RestoreState,
}

impl IrqGuard {
    /// Disable interrupts, remembering the previous state.
    #[inline]
    pub fn new() -> Self {
        // SAFETY: the matching `release` happens in `Drop`, and guards can
        // only be dropped in reverse order of creation within one context.
        let restore = unsafe { critical_section::acquire() };
        Self { restore }
    }

    /// Token proving interrupts are disabled, valid while the guard lives.
    #[inline]
    pub fn token(&self) -> CriticalSection<'_> {
        // SAFETY: interrupts stay disabled until `self` is dropped, which
        // the borrow on `self` outlives.
        unsafe { CriticalSection::new() }
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: `restore` came from the `acquire` in `new`.
        unsafe { critical_section::release(self.restore) }
    }
}

/// Execute a closure within a critical section (interrupts disabled).
///
/// # Usage
/// ```ignore
/// sync::critical_section(|cs| {
///     // Access shared state safely
/// });
/// ```
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    let guard = IrqGuard::new();
    f(guard.token())
}
