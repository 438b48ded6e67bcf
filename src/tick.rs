//! # Virtual Ticks
//!
//! The virtual tick counter is 32 bits wide and wraps. Absolute points are
//! [`Tick`]s; the distance from one tick forward to another is a
//! [`TickDelta`]. "Is earlier than" is only meaningful relative to a base
//! point, so comparisons go through the deltas from that base:
//!
//! ```text
//!   base ──────► a ──────────► b        a.precedes(b, base)
//!   |<-- a - base -->|
//!   |<------- b - base -------->|
//! ```
//!
//! This is the one place the wrapping-subtraction idiom lives.

use core::ops::{Add, AddAssign, Sub};

/// An absolute virtual tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tick(u32);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    #[inline]
    pub const fn from_raw(raw: u32) -> Tick {
        Tick(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Forward distance from `earlier` to `self`.
    #[inline]
    pub const fn since(self, earlier: Tick) -> TickDelta {
        TickDelta(self.0.wrapping_sub(earlier.0))
    }

    /// Does `self` come strictly before `other`, walking forward from `base`?
    #[inline]
    pub fn precedes(self, other: Tick, base: Tick) -> bool {
        self.since(base) < other.since(base)
    }
}

impl Add<u32> for Tick {
    type Output = Tick;

    #[inline]
    fn add(self, ticks: u32) -> Tick {
        Tick(self.0.wrapping_add(ticks))
    }
}

impl Add<TickDelta> for Tick {
    type Output = Tick;

    #[inline]
    fn add(self, delta: TickDelta) -> Tick {
        self + delta.0
    }
}

impl AddAssign<TickDelta> for Tick {
    #[inline]
    fn add_assign(&mut self, delta: TickDelta) {
        *self = *self + delta;
    }
}

impl Sub for Tick {
    type Output = TickDelta;

    #[inline]
    fn sub(self, earlier: Tick) -> TickDelta {
        self.since(earlier)
    }
}

/// Forward distance between two ticks, in `0..2^32`.
///
/// Ordering is plain unsigned ordering of the distance, which is exactly
/// the wraparound-safe "sooner than" test when both distances share a base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickDelta(u32);

impl TickDelta {
    pub const ZERO: TickDelta = TickDelta(0);

    #[inline]
    pub const fn new(ticks: u32) -> TickDelta {
        TickDelta(ticks)
    }

    #[inline]
    pub const fn ticks(self) -> u32 {
        self.0
    }

    /// `self - other`, or zero if `other` is the longer distance.
    #[inline]
    pub const fn saturating_sub(self, other: TickDelta) -> TickDelta {
        TickDelta(self.0.saturating_sub(other.0))
    }
}
