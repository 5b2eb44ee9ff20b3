//! Insertion-ordered key set for ghost entries.
//!
//! Used by the CAR core as the B1/B2 ghost lists: keys recently evicted from
//! a clock list, kept without their values so a re-reference can be told
//! apart from a first-time miss.
//!
//! ## Architecture
//!
//! ```text
//!   index: FxHashMap<K, usize>          nodes: Vec<Option<Node<K>>>
//!   ┌─────────┬─────────┐               head ─► [A] ◄──► [B] ◄──► [C] ◄── tail
//!   │  key A  │   0     │                oldest                     newest
//!   │  key B  │   2     │
//!   │  key C  │   1     │               free: Vec<usize> (recycled node slots)
//!   └─────────┴─────────┘
//! ```
//!
//! ## Behavior
//! - `add(k)`: appends at the tail; a key already present keeps its position
//! - `pop_oldest()`: removes and returns the head
//! - `remove(k)`: unlinks a key wherever it sits
//! - `release_matching(pred)` / `clear_stale_references()`: bulk removal
//!
//! Unlike the MRU-refreshing ghost lists of ARC, this set is never reordered
//! and carries no capacity of its own; the owner trims it.
//!
//! ## Performance
//! - `add` / `pop_oldest` / `remove` / `contains`: O(1) average
//! - `release_matching` / `clear_stale_references`: O(n)
//!
//! `debug_validate_invariants()` is available in debug/test builds.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::liveness::Liveness;

#[derive(Debug)]
struct Node<K> {
    key: K,
    prev: Option<usize>,
    next: Option<usize>,
}

/// FIFO-ordered set of keys (no values).
#[derive(Debug)]
pub struct OrderedEvictionSet<K> {
    nodes: Vec<Option<Node<K>>>,
    free: Vec<usize>,
    index: FxHashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K> OrderedEvictionSet<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty set with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            head: None,
            tail: None,
        }
    }

    /// Returns the number of keys tracked.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Appends `key` at the tail. Returns `false` (and leaves the order
    /// untouched) if the key was already present.
    pub fn add(&mut self, key: K) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        let node = Node {
            key: key.clone(),
            prev: self.tail,
            next: None,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            },
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            },
        };
        match self.tail {
            Some(tail) => {
                if let Some(tail_node) = self.nodes[tail].as_mut() {
                    tail_node.next = Some(id);
                }
            },
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.index.insert(key, id);
        true
    }

    /// Returns the oldest key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        let head = self.head?;
        self.nodes[head].as_ref().map(|node| &node.key)
    }

    /// Removes and returns the oldest key.
    pub fn pop_oldest(&mut self) -> Option<K> {
        let head = self.head?;
        let key = self.unlink(head)?;
        self.index.remove(&key);
        Some(key)
    }

    /// Removes `key`; returns `true` if it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(id) => {
                self.unlink(id);
                true
            },
            None => false,
        }
    }

    /// Removes every key for which `pred` returns `true`.
    ///
    /// Returns the number of keys removed.
    pub fn release_matching<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut doomed = Vec::new();
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let Some(node) = self.nodes[id].as_ref() else {
                break;
            };
            if pred(&node.key) {
                doomed.push(id);
            }
            cursor = node.next;
        }
        for &id in &doomed {
            if let Some(key) = self.unlink(id) {
                self.index.remove(&key);
            }
        }
        doomed.len()
    }

    /// Removes every key whose referent has been reclaimed.
    ///
    /// Returns the number of keys removed.
    pub fn clear_stale_references(&mut self) -> usize
    where
        K: Liveness,
    {
        self.release_matching(|key| !key.is_live())
    }

    /// Iterates keys from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = self.nodes[cursor?].as_ref()?;
            cursor = node.next;
            Some(&node.key)
        })
    }

    /// Removes all keys.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    fn unlink(&mut self, id: usize) -> Option<K> {
        let node = self.nodes.get_mut(id)?.take()?;
        match node.prev {
            Some(prev) => {
                if let Some(prev_node) = self.nodes[prev].as_mut() {
                    prev_node.next = node.next;
                }
            },
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(next_node) = self.nodes[next].as_mut() {
                    next_node.prev = node.prev;
                }
            },
            None => self.tail = node.prev,
        }
        self.free.push(id);
        Some(node.key)
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let occupied = self.nodes.iter().filter(|n| n.is_some()).count();
        assert_eq!(occupied, self.index.len());
        assert_eq!(occupied + self.free.len(), self.nodes.len());

        let mut walked = 0;
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let node = self.nodes[id].as_ref().expect("linked node is empty");
            assert_eq!(node.prev, prev, "broken back link at node {}", id);
            assert_eq!(self.index.get(&node.key), Some(&id));
            walked += 1;
            assert!(walked <= self.index.len(), "cycle in eviction set");
            prev = Some(id);
            cursor = node.next;
        }
        assert_eq!(prev, self.tail);
        assert_eq!(walked, self.index.len());
    }
}

impl<K> Default for OrderedEvictionSet<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
