//! Game object identifiers and allocation.
//!
//! An [`ObjectId`] packs a *generation* counter in the high 32 bits and a slot
//! *index* in the low 32 bits. Components store their owner as an `ObjectId`
//! rather than a pointer, so a handle that outlives its object is detected as
//! stale instead of dangling.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// ObjectId
// ---------------------------------------------------------------------------

/// A generational game object identifier.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Placeholder owner for components that have not been attached yet.
    pub const DETACHED: ObjectId = ObjectId(u64::MAX);

    /// Construct an `ObjectId` from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation, used across the script boundary.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::DETACHED {
            return write!(f, "ObjectId(detached)");
        }
        write!(f, "ObjectId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::DETACHED {
            return write!(f, "detached");
        }
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// ObjectIdAllocator
// ---------------------------------------------------------------------------

/// Allocates and recycles [`ObjectId`]s with generational tracking.
///
/// Free indices are recycled FIFO so that a freshly destroyed slot is not
/// immediately handed out again.
#[derive(Debug)]
pub struct ObjectIdAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_indices: VecDeque<u32>,
}

impl ObjectIdAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_indices: VecDeque::new(),
        }
    }

    /// Allocate a fresh [`ObjectId`], reusing a recycled index when one is
    /// available.
    pub fn allocate(&mut self) -> ObjectId {
        if let Some(index) = self.free_indices.pop_front() {
            // Generation was already bumped on release.
            self.alive[index as usize] = true;
            ObjectId::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            ObjectId::new(index, 0)
        }
    }

    /// Release an id, bumping the generation of its slot so outstanding
    /// copies become stale.
    ///
    /// Returns `false` if the id was already released or is stale.
    pub fn release(&mut self, id: ObjectId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.index() as usize;
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(id.index());
        true
    }

    /// Returns `true` if `id` is currently allocated with a matching generation.
    pub fn is_alive(&self, id: ObjectId) -> bool {
        let idx = id.index() as usize;
        if idx >= self.generations.len() {
            return false;
        }
        self.alive[idx] && self.generations[idx] == id.generation()
    }

    /// Number of currently allocated ids.
    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }

    /// Release every id at once. Slots keep their generations, so ids
    /// handed out before the clear stay stale afterwards.
    pub fn clear(&mut self) {
        for (index, alive) in self.alive.iter_mut().enumerate() {
            if *alive {
                *alive = false;
                self.generations[index] = self.generations[index].wrapping_add(1);
                self.free_indices.push_back(index as u32);
            }
        }
    }
}

impl Default for ObjectIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_unique_ids() {
        let mut alloc = ObjectIdAllocator::new();
        let ids: Vec<ObjectId> = (0..64).map(|_| alloc.allocate()).collect();
        let mut indices: Vec<u32> = ids.iter().map(|id| id.index()).collect();
        indices.sort();
        indices.dedup();
        assert_eq!(indices.len(), 64);
    }

    #[test]
    fn released_slot_comes_back_with_new_generation() {
        let mut alloc = ObjectIdAllocator::new();
        let first = alloc.allocate();
        assert!(alloc.release(first));
        let second = alloc.allocate();
        assert_eq!(second.index(), first.index());
        assert_eq!(second.generation(), 1);
        assert!(!alloc.is_alive(first), "old handle must be stale");
        assert!(alloc.is_alive(second));
    }

    #[test]
    fn double_release_returns_false() {
        let mut alloc = ObjectIdAllocator::new();
        let id = alloc.allocate();
        assert!(alloc.release(id));
        assert!(!alloc.release(id));
    }

    #[test]
    fn alive_count_tracks_release() {
        let mut alloc = ObjectIdAllocator::new();
        let a = alloc.allocate();
        let _b = alloc.allocate();
        assert_eq!(alloc.alive_count(), 2);
        alloc.release(a);
        assert_eq!(alloc.alive_count(), 1);
    }

    #[test]
    fn clear_makes_every_outstanding_id_stale() {
        let mut alloc = ObjectIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        alloc.release(a);
        alloc.clear();
        assert_eq!(alloc.alive_count(), 0);
        assert!(!alloc.is_alive(b));

        let fresh: Vec<ObjectId> = (0..3).map(|_| alloc.allocate()).collect();
        assert!(!fresh.contains(&a));
        assert!(!fresh.contains(&b));
        assert!(!alloc.release(b), "stale id must not release the new owner");
        assert!(fresh.iter().all(|id| alloc.is_alive(*id)));
    }

    #[test]
    fn raw_roundtrip_and_display() {
        let id = ObjectId::new(42, 7);
        assert_eq!(ObjectId::from_raw(id.to_raw()), id);
        assert_eq!(id.to_string(), "42v7");
        assert_eq!(ObjectId::DETACHED.to_string(), "detached");
    }
}
