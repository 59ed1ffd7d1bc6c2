//! Generational Node Table
//!
//! Nodes live in pool boxes; the table maps a small `Key` to each box. A key
//! carries the generation of its slot, so a handle to a freed node is
//! detected instead of aliasing whatever reuses the slot.

use dynparam_rtmem::{Capability, PoolBox, TypedPool};

use crate::error::{EngineError, EngineResult};

/// Index plus generation of a table slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    index: u32,
    generation: u32,
}

impl Key {
    /// Placeholder that never resolves
    pub(crate) const DANGLING: Key = Key {
        index: u32::MAX,
        generation: u32::MAX,
    };
}

struct Slot<T> {
    generation: u32,
    node: Option<PoolBox<T>>,
}

pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    /// Capacity never below `slots.capacity()`, so freeing never reallocates
    free: Vec<u32>,
    len: usize,
    what: &'static str,
}

impl<T> Arena<T> {
    pub(crate) fn with_capacity(what: &'static str, capacity: usize) -> Self {
        let slots = Vec::with_capacity(capacity.max(1));
        let free = Vec::with_capacity(slots.capacity());
        Self {
            slots,
            free,
            len: 0,
            what,
        }
    }

    /// Store `value` in a chunk from `pool`
    ///
    /// With [`Capability::Atomic`] a full table is an error; with
    /// [`Capability::Sleepy`] the table doubles.
    pub(crate) fn insert(
        &mut self,
        pool: &TypedPool<T>,
        capability: Capability,
        value: T,
    ) -> EngineResult<Key> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.slots.len() == self.slots.capacity() {
                    if capability == Capability::Atomic {
                        return Err(EngineError::ArenaFull { what: self.what });
                    }
                    self.slots.reserve(self.slots.capacity());
                    let missing = self.slots.capacity().saturating_sub(self.free.len());
                    self.free.reserve(missing);
                }
                self.slots.push(Slot {
                    generation: 0,
                    node: None,
                });
                (self.slots.len() - 1) as u32
            }
        };

        match pool.alloc(capability, value) {
            Ok(node) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                self.len += 1;
                Ok(Key {
                    index,
                    generation: slot.generation,
                })
            }
            Err(_) => {
                self.free.push(index);
                Err(EngineError::OutOfMemory { what: self.what })
            }
        }
    }

    /// Make sure `headroom` more inserts succeed without reallocating; blocks
    ///
    /// Returns true when the table grew.
    pub(crate) fn reserve_headroom(&mut self, headroom: usize) -> bool {
        let available = self.free.len() + (self.slots.capacity() - self.slots.len());
        if available >= headroom {
            return false;
        }
        self.slots.reserve(headroom - self.free.len());
        let missing = self.slots.capacity().saturating_sub(self.free.len());
        self.free.reserve(missing);
        true
    }

    /// Take the node out; dropping the returned box frees its chunk
    pub(crate) fn remove(&mut self, key: Key) -> Option<PoolBox<T>> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.len -= 1;
        Some(node)
    }

    pub(crate) fn get(&self, key: Key) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.node.as_deref())
    }

    pub(crate) fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.node.as_deref_mut())
    }

    pub(crate) fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Keys of every live node, in slot order
    #[cfg(test)]
    pub(crate) fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|_| Key {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }

    /// Free every node
    pub(crate) fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(index as u32);
        }
        self.len = 0;
    }
}
