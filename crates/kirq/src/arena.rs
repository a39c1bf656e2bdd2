//! Generation-guarded slot arena.
//!
//! Nodes of the line table and of every handler chain live here and are
//! addressed by [`Handle`]s. A handle packs a slot index with the slot's
//! generation; freeing a slot bumps the generation so stale handles are
//! rejected instead of aliasing whatever reuses the slot.

use alloc::vec::Vec;

/// Stable reference to an occupied arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Handle {
    index: u32,
    generation: u32,
}

/// Returned when the arena cannot provide another slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Exhausted;

enum Slot<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

/// Allocation counters of one arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Slots currently holding a value.
    pub live: usize,
    /// Successful allocations since construction.
    pub allocations: u64,
    /// Allocation attempts refused by the capacity bound or the heap.
    pub failed_allocations: u64,
    /// Slots returned to the free list.
    pub frees: u64,
}

pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    /// Head of the intrusive free list threaded through vacant slots.
    free_head: Option<u32>,
    limit: usize,
    stats: ArenaStats,
}

impl<T> Arena<T> {
    /// Creates an empty arena that holds at most `limit` live values.
    pub(crate) const fn with_limit(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            limit,
            stats: ArenaStats {
                live: 0,
                allocations: 0,
                failed_allocations: 0,
                frees: 0,
            },
        }
    }

    /// Stores `value` and returns its handle.
    ///
    /// Reuses a vacant slot when one exists; otherwise grows the backing
    /// storage with a fallible reservation so heap exhaustion surfaces as
    /// [`Exhausted`] rather than an abort.
    pub(crate) fn insert(&mut self, value: T) -> Result<Handle, Exhausted> {
        if self.stats.live >= self.limit {
            self.stats.failed_allocations += 1;
            return Err(Exhausted);
        }

        let handle = match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let Slot::Vacant {
                    generation,
                    next_free,
                } = *slot
                else {
                    // The free list only ever threads vacant slots.
                    self.stats.failed_allocations += 1;
                    return Err(Exhausted);
                };
                self.free_head = next_free;
                *slot = Slot::Occupied { generation, value };
                Handle { index, generation }
            }
            None => {
                let Ok(index) = u32::try_from(self.slots.len()) else {
                    self.stats.failed_allocations += 1;
                    return Err(Exhausted);
                };
                if self.slots.try_reserve(1).is_err() {
                    self.stats.failed_allocations += 1;
                    return Err(Exhausted);
                }
                self.slots.push(Slot::Occupied {
                    generation: 0,
                    value,
                });
                Handle {
                    index,
                    generation: 0,
                }
            }
        };

        self.stats.live += 1;
        self.stats.allocations += 1;
        Ok(handle)
    }

    /// Frees the slot behind `handle`, returning its value.
    ///
    /// Returns `None` for stale or foreign handles.
    pub(crate) fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == handle.generation => {}
            _ => return None,
        }

        let vacant = Slot::Vacant {
            generation: handle.generation.wrapping_add(1),
            next_free: self.free_head,
        };
        let Slot::Occupied { value, .. } = core::mem::replace(slot, vacant) else {
            return None;
        };
        self.free_head = Some(handle.index);
        self.stats.live -= 1;
        self.stats.frees += 1;
        Some(value)
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&T> {
        match self.slots.get(handle.index as usize)? {
            Slot::Occupied { generation, value } if *generation == handle.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        match self.slots.get_mut(handle.index as usize)? {
            Slot::Occupied { generation, value } if *generation == handle.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.stats.live
    }

    pub(crate) fn stats(&self) -> ArenaStats {
        self.stats
    }
}
