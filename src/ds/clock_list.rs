//! Clock list: key → value map with a persistent clock hand.
//!
//! Backs the T1/T2 lists of the CAR core. Entries carry a reference bit that
//! hits set (through a shared borrow) and the sweep clears. Only [`next`]
//! moves the hand, so every long-lived entry is visited once per revolution
//! regardless of how many inserts and removals happen in between.
//!
//! [`next`]: ClockList::next
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ClockList<K, V>                                │
//! │                                                                         │
//! │   index: FxHashMap<K, usize>      slots: Vec<Option<Slot<K, V>>>        │
//! │                                                                         │
//! │   Intrusive circular ring through the slot array:                       │
//! │     ring_next: Vec<usize>         ring_prev: Vec<usize>                 │
//! │                                                                         │
//! │            hand                                                         │
//! │             │                                                           │
//! │             ▼                                                           │
//! │   ┌──► [A ref=0] ──► [B ref=1] ──► [C ref=0] ──┐                          │
//! │   └────────────────────────────────────────────┘                        │
//! │                                                                         │
//! │   put(D): linked just before the hand (after C); hand stays on A        │
//! │   next(): returns A, hand moves to B                                    │
//! │   remove(hand): hand moves to the successor                             │
//! │                                                                         │
//! │   free: Vec<usize> (recycled slot indices)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Operation    | Time   | Notes                                     |
//! |--------------|--------|-------------------------------------------|
//! | `get`        | O(1)   | No side effects                           |
//! | `get_marked` | O(1)   | Sets the reference bit via `&self`        |
//! | `put`        | O(1)   | Insert before hand, or overwrite in place |
//! | `remove`     | O(1)   | Unlinks; repositions hand if needed       |
//! | `next`       | O(1)   | Returns entry under hand, advances        |
//!
//! `debug_validate_invariants()` is available in debug/test builds.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;

use crate::ds::liveness::Liveness;

/// A cached value plus its reference bit.
#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    referenced: AtomicBool,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            referenced: AtomicBool::new(false),
        }
    }

    #[inline]
    fn is_referenced(&self) -> bool {
        self.referenced.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct Slot<K, V> {
    key: K,
    entry: CacheEntry<V>,
}

/// Ordered key → value map swept by a clock hand.
#[derive(Debug)]
pub struct ClockList<K, V> {
    index: FxHashMap<K, usize>,
    slots: Vec<Option<Slot<K, V>>>,
    ring_next: Vec<usize>,
    ring_prev: Vec<usize>,
    free: Vec<usize>,
    hand: Option<usize>,
}

impl<K, V> ClockList<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty list with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            slots: Vec::with_capacity(capacity),
            ring_next: Vec::with_capacity(capacity),
            ring_prev: Vec::with_capacity(capacity),
            free: Vec::new(),
            hand: None,
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Returns `key`'s value without touching the reference bit.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.slot(key).map(|slot| &slot.entry.value)
    }

    /// Returns `key`'s value and sets its reference bit.
    ///
    /// Takes `&self`: the bit is atomic, so hits can be served while other
    /// readers hold the same shared borrow.
    pub fn get_marked(&self, key: &K) -> Option<&V> {
        let slot = self.slot(key)?;
        slot.entry.referenced.store(true, Ordering::Relaxed);
        Some(&slot.entry.value)
    }

    /// Returns the reference bit of `key`, if present.
    pub fn is_referenced(&self, key: &K) -> Option<bool> {
        self.slot(key).map(|slot| slot.entry.is_referenced())
    }

    /// Clears the reference bit of `key`; returns `false` if missing.
    pub fn clear_reference(&self, key: &K) -> bool {
        match self.slot(key) {
            Some(slot) => {
                slot.entry.referenced.store(false, Ordering::Relaxed);
                true
            },
            None => false,
        }
    }

    /// Inserts `key` just before the hand, or overwrites its value in place.
    ///
    /// Never moves the hand. Returns the previous value on overwrite; the
    /// reference bit of an overwritten entry is left as it was.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&idx) = self.index.get(&key)
            && let Some(slot) = self.slots[idx].as_mut()
        {
            return Some(std::mem::replace(&mut slot.entry.value, value));
        }

        let slot = Slot {
            key: key.clone(),
            entry: CacheEntry::new(value),
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                idx
            },
            None => {
                self.slots.push(Some(slot));
                self.ring_next.push(0);
                self.ring_prev.push(0);
                self.slots.len() - 1
            },
        };
        self.link_before_hand(idx);
        self.index.insert(key, idx);
        None
    }

    /// Removes `key` and returns its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.index.remove(key)?;
        self.unlink(idx);
        let slot = self.slots[idx].take()?;
        self.free.push(idx);
        Some(slot.entry.value)
    }

    /// Returns the entry under the hand and advances the hand one step.
    ///
    /// The entry is not removed. Yields `(key, value, referenced)`; `None`
    /// only when the list is empty.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(&K, &V, bool)> {
        let idx = self.hand?;
        self.hand = Some(self.ring_next[idx]);
        let slot = self.slots[idx].as_ref()?;
        Some((&slot.key, &slot.entry.value, slot.entry.is_referenced()))
    }

    /// Returns the entry under the hand without advancing.
    pub fn current(&self) -> Option<(&K, &V, bool)> {
        let slot = self.slots[self.hand?].as_ref()?;
        Some((&slot.key, &slot.entry.value, slot.entry.is_referenced()))
    }

    /// Removes every entry whose key satisfies `pred`.
    ///
    /// Returns the number of entries removed.
    pub fn release_matching<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let doomed: Vec<K> = self.index.keys().filter(|k| pred(k)).cloned().collect();
        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }

    /// Removes every entry whose key is no longer live.
    ///
    /// If the hand pointed at a removed entry it moves on to the next
    /// survivor, or becomes unset when nothing survives.
    pub fn clear_stale_references(&mut self) -> usize
    where
        K: Liveness,
    {
        self.release_matching(|key| !key.is_live())
    }

    /// Iterates entries in clock order, starting at the hand.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V, bool)> + '_ {
        let start = self.hand;
        let mut cursor = start;
        let mut remaining = self.len();
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let idx = cursor?;
            let slot = self.slots[idx].as_ref()?;
            remaining -= 1;
            cursor = Some(self.ring_next[idx]);
            Some((&slot.key, &slot.entry.value, slot.entry.is_referenced()))
        })
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.ring_next.clear();
        self.ring_prev.clear();
        self.free.clear();
        self.hand = None;
    }

    #[inline]
    fn slot(&self, key: &K) -> Option<&Slot<K, V>> {
        let &idx = self.index.get(key)?;
        self.slots[idx].as_ref()
    }

    /// Links `idx` between the hand's predecessor and the hand, making it
    /// the last entry the hand reaches. An empty ring becomes a self-loop
    /// with the hand on it.
    fn link_before_hand(&mut self, idx: usize) {
        match self.hand {
            None => {
                self.ring_next[idx] = idx;
                self.ring_prev[idx] = idx;
                self.hand = Some(idx);
            },
            Some(h) => {
                let h_prev = self.ring_prev[h];
                self.ring_next[idx] = h;
                self.ring_prev[idx] = h_prev;
                self.ring_next[h_prev] = idx;
                self.ring_prev[h] = idx;
            },
        }
    }

    fn unlink(&mut self, idx: usize) {
        let next = self.ring_next[idx];
        let prev = self.ring_prev[idx];
        if next == idx {
            self.hand = None;
        } else {
            self.ring_next[prev] = next;
            self.ring_prev[next] = prev;
            if self.hand == Some(idx) {
                self.hand = Some(next);
            }
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        assert_eq!(self.hand.is_none(), self.index.is_empty());
        assert_eq!(self.slots.len(), self.ring_next.len());
        assert_eq!(self.slots.len(), self.ring_prev.len());
        assert_eq!(self.index.len() + self.free.len(), self.slots.len());

        let mut walked = 0;
        if let Some(start) = self.hand {
            let mut cur = start;
            loop {
                let slot = self.slots[cur]
                    .as_ref()
                    .expect("ring links to an empty slot");
                assert_eq!(self.index.get(&slot.key), Some(&cur));
                assert_eq!(self.ring_next[self.ring_prev[cur]], cur);
                assert_eq!(self.ring_prev[self.ring_next[cur]], cur);
                walked += 1;
                assert!(walked <= self.index.len(), "clock ring cycle detected");
                cur = self.ring_next[cur];
                if cur == start {
                    break;
                }
            }
        }
        assert_eq!(walked, self.index.len());

        for &idx in &self.free {
            assert!(self.slots[idx].is_none(), "free slot {} is occupied", idx);
        }
    }
}

impl<K, V> Default for ClockList<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
