//! # Timer Arena
//!
//! Fixed-capacity slot table holding every registered timer object. Free
//! slots form a singly linked list threaded through the table; slots that
//! were never used sit above `high_water` and are handed out in order.
//!
//! Walk order is slot order, which is the only ordering between timers that
//! expire on the same tick.
//!
//! Every slot carries a generation that is bumped when the slot is freed,
//! so a [`TimerId`] kept past its timer's destruction is recognised as stale
//! instead of silently addressing the slot's next occupant. Ids also carry
//! the tag of the arena that issued them, so another clock's id is stale
//! here too.

use crate::error::ClockError;
use crate::tick::{Tick, TickDelta};

/// Expiry callback. Whatever it needs is captured by the closure itself.
pub type Callback = &'static (dyn Fn() + Sync);

/// Copyable reference to a registered timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerId {
    index: u16,
    generation: u16,
    owner: u16,
}

impl TimerId {
    /// Slot index inside the arena.
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

/// A logical timer.
#[derive(Clone, Copy)]
pub(crate) struct TimerObject {
    /// Relative delay used by the next arm.
    pub timeout: u32,
    /// Absolute due tick; meaningful only while `active`.
    pub curr_timeout: Tick,
    /// `0` for one-shot timers.
    pub period: u32,
    pub active: bool,
    /// Tick of the most recent expiry.
    pub last_fired: Option<Tick>,
    pub callback: Callback,
}

impl TimerObject {
    pub(crate) fn new(callback: Callback, timeout: u32, period: u32) -> TimerObject {
        TimerObject {
            timeout,
            curr_timeout: Tick::ZERO,
            period,
            active: false,
            last_fired: None,
            callback,
        }
    }
}

enum Entry {
    Free { next: Option<u16> },
    Used(TimerObject),
}

struct Slot {
    generation: u16,
    entry: Entry,
}

impl Slot {
    const FREE: Slot = Slot {
        generation: 0,
        entry: Entry::Free { next: None },
    };
}

/// Result of visiting one slot during a service walk.
pub(crate) enum Visit {
    /// No slot at this index or above.
    End,
    /// Free slot or inactive timer.
    Idle,
    /// Active timer, due this far after the walked tick.
    Pending(TickDelta),
    /// Active timer due on the walked tick; its state has been advanced and
    /// the callback must now be run.
    Due(Callback),
}

pub(crate) struct TimerQueue<const N: usize> {
    slots: [Slot; N],
    free_head: Option<u16>,
    high_water: usize,
    len: usize,
    owner: u16,
}

impl<const N: usize> TimerQueue<N> {
    pub const fn new() -> Self {
        assert!(N <= u16::MAX as usize, "arena index must fit in 16 bits");
        TimerQueue {
            slots: [Slot::FREE; N],
            free_head: None,
            high_water: 0,
            len: 0,
            owner: 0,
        }
    }

    /// Stamp ids issued from now on with `owner`.
    pub fn bind(&mut self, owner: u16) {
        self.owner = owner;
    }

    /// Registered timers.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn insert(&mut self, obj: TimerObject) -> Result<TimerId, ClockError> {
        let index = match self.free_head {
            Some(index) => {
                let Entry::Free { next } = self.slots[index as usize].entry else {
                    unreachable!("free list points at a used slot");
                };
                self.free_head = next;
                index as usize
            }
            None if self.high_water < N => {
                self.high_water += 1;
                self.high_water - 1
            }
            None => return Err(ClockError::QueueFull),
        };

        let slot = &mut self.slots[index];
        slot.entry = Entry::Used(obj);
        self.len += 1;
        Ok(TimerId {
            index: index as u16,
            generation: slot.generation,
            owner: self.owner,
        })
    }

    pub fn remove(&mut self, id: TimerId) -> Result<TimerObject, ClockError> {
        self.get(id)?;
        let slot = &mut self.slots[id.index()];
        let entry = core::mem::replace(
            &mut slot.entry,
            Entry::Free {
                next: self.free_head,
            },
        );
        slot.generation = slot.generation.wrapping_add(1);
        self.free_head = Some(id.index);
        self.len -= 1;
        match entry {
            Entry::Used(obj) => Ok(obj),
            Entry::Free { .. } => Err(ClockError::StaleTimer),
        }
    }

    pub fn get(&self, id: TimerId) -> Result<&TimerObject, ClockError> {
        match self.slots.get(id.index()) {
            Some(Slot {
                generation,
                entry: Entry::Used(obj),
            }) if *generation == id.generation && id.owner == self.owner => Ok(obj),
            _ => Err(ClockError::StaleTimer),
        }
    }

    pub fn get_mut(&mut self, id: TimerId) -> Result<&mut TimerObject, ClockError> {
        match self.slots.get_mut(id.index()) {
            Some(Slot {
                generation,
                entry: Entry::Used(obj),
            }) if *generation == id.generation && id.owner == self.owner => Ok(obj),
            _ => Err(ClockError::StaleTimer),
        }
    }

    /// Service slot `index` for `this_tick`.
    pub fn visit(&mut self, index: usize, this_tick: Tick) -> Visit {
        if index >= self.high_water {
            return Visit::End;
        }
        let Entry::Used(obj) = &mut self.slots[index].entry else {
            return Visit::Idle;
        };
        if !obj.active {
            return Visit::Idle;
        }
        if obj.curr_timeout == this_tick {
            obj.last_fired = Some(this_tick);
            if obj.period == 0 {
                obj.active = false;
            } else {
                obj.curr_timeout = obj.curr_timeout + obj.period;
            }
            return Visit::Due(obj.callback);
        }
        Visit::Pending(obj.curr_timeout - this_tick)
    }

    /// Distance from `this_tick` to slot `index`'s deadline, if it is active.
    pub fn pending_delta(&self, index: usize, this_tick: Tick) -> Option<TickDelta> {
        match &self.slots.get(index)?.entry {
            Entry::Used(obj) if obj.active => Some(obj.curr_timeout - this_tick),
            _ => None,
        }
    }

    /// Distance from `this_tick` to the soonest active deadline.
    pub fn next_distance(&self, this_tick: Tick) -> Option<TickDelta> {
        (0..self.high_water)
            .filter_map(|index| self.pending_delta(index, this_tick))
            .min()
    }
}
