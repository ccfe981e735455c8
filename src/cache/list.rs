//! Ordered Entry List Module
//!
//! Doubly linked ring of nodes stored in a slot arena and linked by index.
//!
//! ```text
//!   slot 0 is the sentinel; it is never handed out
//!
//!   ┌──────────────────────────────────────────────────┐
//!   └─► [sentinel] ◄──► [front] ◄──► ... ◄──► [back] ◄─┘
//! ```
//!
//! - Front = most recently used, `sentinel.next`
//! - Back = least recently used, `sentinel.prev`
//! - Empty = sentinel linked to itself in both directions
//!
//! Nodes are addressed through [`NodeHandle`]s that carry the owning list's
//! id and the node's generation. A handle from another list, or one whose
//! node has been removed (even if its slot was reused since), is rejected
//! and the operation becomes a no-op.

use std::sync::atomic::{AtomicU64, Ordering};

const SENTINEL: usize = 0;

static NEXT_LIST_ID: AtomicU64 = AtomicU64::new(1);

// == Node Handle ==
/// Stable reference to a node in an [`EntryList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    list: u64,
    slot: usize,
    generation: u64,
}

#[derive(Debug)]
struct Node<T> {
    /// None for the sentinel and for free slots
    value: Option<T>,
    prev: usize,
    next: usize,
    generation: u64,
}

impl<T> Node<T> {
    fn sentinel() -> Self {
        Self {
            value: None,
            prev: SENTINEL,
            next: SENTINEL,
            generation: 0,
        }
    }
}

// == Entry List ==
/// Arena-backed circular doubly linked list with O(1) push, remove and move.
#[derive(Debug)]
pub struct EntryList<T> {
    id: u64,
    nodes: Vec<Node<T>>,
    free: Vec<usize>,
    len: usize,
    next_generation: u64,
}

impl<T> EntryList<T> {
    // == Constructor ==
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty list with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity + 1);
        nodes.push(Node::sentinel());
        Self {
            id: NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed),
            nodes,
            free: Vec::new(),
            len: 0,
            next_generation: 1,
        }
    }

    // == Length ==
    /// Returns the number of nodes, excluding the sentinel. O(1).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // == Ownership ==
    /// Returns true if `handle` refers to a live node of this list.
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.resolve(handle).is_some()
    }

    fn resolve(&self, handle: NodeHandle) -> Option<usize> {
        if handle.list != self.id || handle.slot == SENTINEL {
            return None;
        }
        let node = self.nodes.get(handle.slot)?;
        if node.value.is_some() && node.generation == handle.generation {
            Some(handle.slot)
        } else {
            None
        }
    }

    fn handle(&self, slot: usize) -> NodeHandle {
        NodeHandle {
            list: self.id,
            slot,
            generation: self.nodes[slot].generation,
        }
    }

    // == Front / Back ==
    /// Returns the most recently used node, or None if the list is empty.
    pub fn front(&self) -> Option<NodeHandle> {
        match self.nodes[SENTINEL].next {
            SENTINEL => None,
            slot => Some(self.handle(slot)),
        }
    }

    /// Returns the least recently used node, or None if the list is empty.
    pub fn back(&self) -> Option<NodeHandle> {
        match self.nodes[SENTINEL].prev {
            SENTINEL => None,
            slot => Some(self.handle(slot)),
        }
    }

    /// Returns the node after `handle` (towards the back), if any.
    pub fn next(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let slot = self.resolve(handle)?;
        match self.nodes[slot].next {
            SENTINEL => None,
            next => Some(self.handle(next)),
        }
    }

    /// Returns the node before `handle` (towards the front), if any.
    pub fn prev(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let slot = self.resolve(handle)?;
        match self.nodes[slot].prev {
            SENTINEL => None,
            prev => Some(self.handle(prev)),
        }
    }

    // == Access ==
    pub fn get(&self, handle: NodeHandle) -> Option<&T> {
        let slot = self.resolve(handle)?;
        self.nodes[slot].value.as_ref()
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut T> {
        let slot = self.resolve(handle)?;
        self.nodes[slot].value.as_mut()
    }

    // == Insertion ==
    /// Inserts `value` at the front and returns its handle.
    pub fn push_front(&mut self, value: T) -> NodeHandle {
        let slot = self.alloc(value);
        self.link_after(slot, SENTINEL);
        self.handle(slot)
    }

    /// Inserts `value` at the back and returns its handle.
    pub fn push_back(&mut self, value: T) -> NodeHandle {
        let slot = self.alloc(value);
        let back = self.nodes[SENTINEL].prev;
        self.link_after(slot, back);
        self.handle(slot)
    }

    /// Inserts `value` immediately after `mark`.
    ///
    /// Returns None and leaves the list untouched if `mark` is not a node of
    /// this list.
    pub fn insert_after(&mut self, value: T, mark: NodeHandle) -> Option<NodeHandle> {
        let at = self.resolve(mark)?;
        let slot = self.alloc(value);
        self.link_after(slot, at);
        Some(self.handle(slot))
    }

    /// Inserts `value` immediately before `mark`.
    ///
    /// Returns None and leaves the list untouched if `mark` is not a node of
    /// this list.
    pub fn insert_before(&mut self, value: T, mark: NodeHandle) -> Option<NodeHandle> {
        let at = self.resolve(mark)?;
        let slot = self.alloc(value);
        let prev = self.nodes[at].prev;
        self.link_after(slot, prev);
        Some(self.handle(slot))
    }

    // == Removal ==
    /// Unlinks the node and returns its value.
    ///
    /// Returns None, without touching the list, if `handle` does not refer
    /// to a live node of this list.
    pub fn remove(&mut self, handle: NodeHandle) -> Option<T> {
        let slot = self.resolve(handle)?;
        self.unlink(slot);
        let node = &mut self.nodes[slot];
        node.prev = SENTINEL;
        node.next = SENTINEL;
        let value = node.value.take();
        self.free.push(slot);
        self.len -= 1;
        value
    }

    /// Removes every node. Outstanding handles become invalid.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[SENTINEL] = Node::sentinel();
        self.free.clear();
        self.len = 0;
    }

    // == Reordering ==
    /// Moves the node to the front. No-op if it is already there or does not
    /// belong to this list.
    pub fn move_to_front(&mut self, handle: NodeHandle) {
        if let Some(slot) = self.resolve(handle) {
            if self.nodes[SENTINEL].next != slot {
                self.unlink(slot);
                self.link_after(slot, SENTINEL);
            }
        }
    }

    /// Moves the node to the back. No-op if it is already there or does not
    /// belong to this list.
    pub fn move_to_back(&mut self, handle: NodeHandle) {
        if let Some(slot) = self.resolve(handle) {
            let back = self.nodes[SENTINEL].prev;
            if back != slot {
                self.unlink(slot);
                self.link_after(slot, back);
            }
        }
    }

    // == Iteration ==
    /// Iterates values from front (newest) to back (oldest). Use `.rev()`
    /// for oldest-first order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            head: self.nodes[SENTINEL].next,
            tail: self.nodes[SENTINEL].prev,
            remaining: self.len,
        }
    }

    // == Internals ==
    fn alloc(&mut self, value: T) -> usize {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.len += 1;
        let node = Node {
            value: Some(value),
            prev: SENTINEL,
            next: SENTINEL,
            generation,
        };
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn link_after(&mut self, slot: usize, at: usize) {
        let next = self.nodes[at].next;
        self.nodes[slot].prev = at;
        self.nodes[slot].next = next;
        self.nodes[at].next = slot;
        self.nodes[next].prev = slot;
    }

    fn unlink(&mut self, slot: usize) {
        let prev = self.nodes[slot].prev;
        let next = self.nodes[slot].next;
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    /// Walks the ring in both directions and checks it against `len`.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut count = 0;
        let mut slot = self.nodes[SENTINEL].next;
        while slot != SENTINEL {
            let next = self.nodes[slot].next;
            assert_eq!(self.nodes[next].prev, slot, "broken back link at {}", next);
            assert!(self.nodes[slot].value.is_some(), "free slot {} is linked", slot);
            count += 1;
            assert!(count <= self.len, "ring longer than len");
            slot = next;
        }
        assert_eq!(count, self.len);
        assert_eq!(self.nodes.len() - 1 - self.free.len(), self.len);
    }
}

impl<T> Default for EntryList<T> {
    fn default() -> Self {
        Self::new()
    }
}

// == Iterator ==
/// Double-ended iterator over list values.
pub struct Iter<'a, T> {
    list: &'a EntryList<T>,
    head: usize,
    tail: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.list.nodes[self.head];
        self.head = node.next;
        self.remaining -= 1;
        node.value.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.list.nodes[self.tail];
        self.tail = node.prev;
        self.remaining -= 1;
        node.value.as_ref()
    }
}

impl<'a, T> ExactSizeIterator for Iter<'a, T> {}
