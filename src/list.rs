//! Replacement list: the ordered container behind the free and used lists.
//!
//! Entries live in a [`SlotArena`] and are linked by `SlotId`. An
//! `FxHashMap<ImageId, SlotId>` gives O(1) lookup, so moving an accessed
//! image or removing a specific one never scans the list.
//!
//! ## Orientation
//!
//! ```text
//!   front ─► [most valuable] ◄──► ... ◄──► [eviction candidate] ◄─ end
//! ```
//!
//! Replacement policies only decide *where* an entry goes (front, or by
//! size) and whether an access moves it. Eviction always happens at the end.
//!
//! ## Performance
//! - `add_at_front` / `bring_to_front` / `remove` / `remove_from_end`: O(1)
//! - `add_sorted_by_size`: O(n)
//! - `iter`: O(n)

use rustc_hash::FxHashMap;

use crate::ds::slot_arena::{SlotArena, SlotId};
use crate::image::ImageId;

#[derive(Debug)]
struct Node {
    id: ImageId,
    bytes: usize,
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

/// Ordered list of resident images with byte accounting.
#[derive(Debug, Default)]
pub struct ReplacementList {
    arena: SlotArena<Node>,
    index: FxHashMap<ImageId, SlotId>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
    total_bytes: usize,
}

impl ReplacementList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: SlotArena::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            head: None,
            tail: None,
            total_bytes: 0,
        }
    }

    /// Accumulated byte size of every entry.
    pub fn size(&self) -> usize {
        self.total_bytes
    }

    /// Number of entries.
    pub fn quantity(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.index.contains_key(&id)
    }

    /// Recorded byte size of `id`, if present.
    pub fn bytes_of(&self, id: ImageId) -> Option<usize> {
        let slot = *self.index.get(&id)?;
        self.arena.get(slot).map(|node| node.bytes)
    }

    /// Inserts `id` as the first entry. Returns `false` if already present.
    pub fn add_at_front(&mut self, id: ImageId, bytes: usize) -> bool {
        if self.contains(id) {
            return false;
        }
        let slot = self.arena.insert(Node {
            id,
            bytes,
            prev: None,
            next: None,
        });
        self.attach_front(slot);
        self.index.insert(id, slot);
        self.total_bytes += bytes;
        true
    }

    /// Inserts `id` keeping the list sorted by ascending size from front to
    /// end. Among equal sizes the newcomer goes in front of the existing
    /// entries, so older ones are evicted first.
    pub fn add_sorted_by_size(&mut self, id: ImageId, bytes: usize) -> bool {
        if self.contains(id) {
            return false;
        }

        let mut anchor = self.head;
        while let Some(current) = anchor {
            let Some(node) = self.arena.get(current) else {
                break;
            };
            if node.bytes >= bytes {
                break;
            }
            anchor = node.next;
        }

        let slot = self.arena.insert(Node {
            id,
            bytes,
            prev: None,
            next: None,
        });
        match anchor {
            Some(before) => self.attach_before(slot, before),
            None => self.attach_back(slot),
        }
        self.index.insert(id, slot);
        self.total_bytes += bytes;
        true
    }

    /// Moves an existing entry to the front.
    pub fn bring_to_front(&mut self, id: ImageId) -> bool {
        let Some(&slot) = self.index.get(&id) else {
            return false;
        };
        if self.head == Some(slot) {
            return true;
        }
        self.detach(slot);
        self.attach_front(slot);
        true
    }

    /// Removes `id` and returns its byte size.
    pub fn remove(&mut self, id: ImageId) -> Option<usize> {
        let slot = self.index.remove(&id)?;
        self.detach(slot);
        let node = self.arena.remove(slot)?;
        self.total_bytes -= node.bytes;
        Some(node.bytes)
    }

    /// Removes the last entry (the eviction end).
    pub fn remove_from_end(&mut self) -> Option<(ImageId, usize)> {
        let slot = self.tail?;
        let id = self.arena.get(slot)?.id;
        self.remove(id).map(|bytes| (id, bytes))
    }

    /// Returns the last entry without removing it.
    pub fn peek_end(&self) -> Option<(ImageId, usize)> {
        let slot = self.tail?;
        self.arena.get(slot).map(|node| (node.id, node.bytes))
    }

    /// Returns the first entry without removing it.
    pub fn peek_front(&self) -> Option<(ImageId, usize)> {
        let slot = self.head?;
        self.arena.get(slot).map(|node| (node.id, node.bytes))
    }

    /// Iterates `(id, bytes)` from front to end.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            current: self.head,
        }
    }

    /// Ids from front to end.
    pub fn ids(&self) -> Vec<ImageId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
        self.total_bytes = 0;
    }

    fn detach(&mut self, slot: SlotId) {
        let Some((prev, next)) = self.arena.get(slot).map(|node| (node.prev, node.next)) else {
            return;
        };

        match prev.and_then(|p| self.arena.get_mut(p)) {
            Some(prev_node) => prev_node.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.arena.get_mut(n)) {
            Some(next_node) => next_node.prev = prev,
            None => self.tail = prev,
        }

        if let Some(node) = self.arena.get_mut(slot) {
            node.prev = None;
            node.next = None;
        }
    }

    fn attach_front(&mut self, slot: SlotId) {
        let old_head = self.head;
        if let Some(node) = self.arena.get_mut(slot) {
            node.prev = None;
            node.next = old_head;
        }
        match old_head.and_then(|h| self.arena.get_mut(h)) {
            Some(head_node) => head_node.prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }

    fn attach_back(&mut self, slot: SlotId) {
        let old_tail = self.tail;
        if let Some(node) = self.arena.get_mut(slot) {
            node.next = None;
            node.prev = old_tail;
        }
        match old_tail.and_then(|t| self.arena.get_mut(t)) {
            Some(tail_node) => tail_node.next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }

    fn attach_before(&mut self, slot: SlotId, before: SlotId) {
        let Some(prev) = self.arena.get(before).map(|node| node.prev) else {
            self.attach_back(slot);
            return;
        };
        let Some(prev) = prev else {
            self.attach_front(slot);
            return;
        };

        if let Some(node) = self.arena.get_mut(slot) {
            node.prev = Some(prev);
            node.next = Some(before);
        }
        if let Some(prev_node) = self.arena.get_mut(prev) {
            prev_node.next = Some(slot);
        }
        if let Some(before_node) = self.arena.get_mut(before) {
            before_node.prev = Some(slot);
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if self.head.is_none() || self.tail.is_none() {
            assert!(self.head.is_none());
            assert!(self.tail.is_none());
            assert_eq!(self.quantity(), 0);
            assert_eq!(self.total_bytes, 0);
            assert!(self.index.is_empty());
            return;
        }

        let mut seen = std::collections::HashSet::new();
        let mut count = 0usize;
        let mut bytes = 0usize;
        let mut current = self.head;
        let mut prev = None;

        while let Some(slot) = current {
            assert!(seen.insert(slot));
            let node = self.arena.get(slot).expect("node missing");
            assert_eq!(node.prev, prev);
            assert_eq!(self.index.get(&node.id), Some(&slot));
            if node.next.is_none() {
                assert_eq!(self.tail, Some(slot));
            }
            bytes += node.bytes;
            prev = Some(slot);
            current = node.next;
            count += 1;
            assert!(count <= self.quantity());
        }

        assert_eq!(count, self.quantity());
        assert_eq!(self.index.len(), self.quantity());
        assert_eq!(bytes, self.total_bytes);
    }
}

/// Front-to-end iterator over `(ImageId, bytes)`.
pub struct Iter<'a> {
    list: &'a ReplacementList,
    current: Option<SlotId>,
}

impl Iterator for Iter<'_> {
    type Item = (ImageId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.current?;
        let node = self.list.arena.get(slot)?;
        self.current = node.next;
        Some((node.id, node.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u32) -> ImageId {
        ImageId(raw)
    }

    #[test]
    fn add_at_front_orders_newest_first() {
        let mut list = ReplacementList::new();
        assert!(list.add_at_front(id(1), 10));
        assert!(list.add_at_front(id(2), 20));
        assert!(list.add_at_front(id(3), 30));
        assert_eq!(list.ids(), vec![id(3), id(2), id(1)]);
        assert_eq!(list.size(), 60);
        assert_eq!(list.quantity(), 3);
        assert_eq!(list.peek_end(), Some((id(1), 10)));
        list.debug_validate_invariants();
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut list = ReplacementList::new();
        assert!(list.add_at_front(id(1), 10));
        assert!(!list.add_at_front(id(1), 99));
        assert!(!list.add_sorted_by_size(id(1), 99));
        assert_eq!(list.size(), 10);
    }

    #[test]
    fn sorted_insert_keeps_largest_at_end() {
        let mut list = ReplacementList::new();
        list.add_sorted_by_size(id(1), 10);
        list.add_sorted_by_size(id(2), 50);
        list.add_sorted_by_size(id(3), 5);
        list.add_sorted_by_size(id(4), 20);
        let sizes: Vec<_> = list.iter().map(|(_, b)| b).collect();
        assert_eq!(sizes, vec![5, 10, 20, 50]);
        assert_eq!(list.remove_from_end(), Some((id(2), 50)));
        list.debug_validate_invariants();
    }

    #[test]
    fn sorted_insert_ties_evict_oldest_first() {
        let mut list = ReplacementList::new();
        list.add_sorted_by_size(id(1), 10);
        list.add_sorted_by_size(id(2), 10);
        list.add_sorted_by_size(id(3), 10);
        assert_eq!(list.ids(), vec![id(3), id(2), id(1)]);
        assert_eq!(list.remove_from_end(), Some((id(1), 10)));
    }

    #[test]
    fn bring_to_front_moves_entry() {
        let mut list = ReplacementList::new();
        list.add_at_front(id(1), 1);
        list.add_at_front(id(2), 1);
        list.add_at_front(id(3), 1);
        assert!(list.bring_to_front(id(1)));
        assert_eq!(list.ids(), vec![id(1), id(3), id(2)]);
        assert!(list.bring_to_front(id(1)));
        assert!(!list.bring_to_front(id(9)));
        list.debug_validate_invariants();
    }

    #[test]
    fn remove_middle_and_ends() {
        let mut list = ReplacementList::new();
        list.add_at_front(id(1), 1);
        list.add_at_front(id(2), 2);
        list.add_at_front(id(3), 3);

        assert_eq!(list.remove(id(2)), Some(2));
        assert_eq!(list.ids(), vec![id(3), id(1)]);
        assert_eq!(list.remove(id(2)), None);

        assert_eq!(list.remove(id(3)), Some(3));
        assert_eq!(list.peek_front(), Some((id(1), 1)));
        assert_eq!(list.peek_end(), Some((id(1), 1)));

        assert_eq!(list.remove_from_end(), Some((id(1), 1)));
        assert!(list.is_empty());
        assert_eq!(list.size(), 0);
        assert_eq!(list.remove_from_end(), None);
        list.debug_validate_invariants();
    }

    #[test]
    fn bytes_of_and_clear() {
        let mut list = ReplacementList::with_capacity(4);
        list.add_at_front(id(1), 7);
        assert_eq!(list.bytes_of(id(1)), Some(7));
        assert_eq!(list.bytes_of(id(2)), None);
        list.clear();
        assert!(list.is_empty());
        assert!(!list.contains(id(1)));
        list.debug_validate_invariants();
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Front(u32, usize),
        Sorted(u32, usize),
        Bump(u32),
        Remove(u32),
        PopEnd,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..32, 0usize..1000).prop_map(|(k, b)| Op::Front(k, b)),
            (0u32..32, 0usize..1000).prop_map(|(k, b)| Op::Sorted(k, b)),
            (0u32..32).prop_map(Op::Bump),
            (0u32..32).prop_map(Op::Remove),
            Just(Op::PopEnd),
        ]
    }

    proptest! {
        /// Links, index and byte totals stay consistent under any op mix.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_invariants_hold(ops in prop::collection::vec(op(), 0..200)) {
            let mut list = ReplacementList::new();
            for op in ops {
                match op {
                    Op::Front(k, b) => { list.add_at_front(ImageId(k), b); },
                    Op::Sorted(k, b) => { list.add_sorted_by_size(ImageId(k), b); },
                    Op::Bump(k) => { list.bring_to_front(ImageId(k)); },
                    Op::Remove(k) => { list.remove(ImageId(k)); },
                    Op::PopEnd => { list.remove_from_end(); },
                }
                list.debug_validate_invariants();
            }
        }

        /// With only sorted inserts, the end is always the largest entry.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_sorted_end_is_max(sizes in prop::collection::vec(0usize..10_000, 1..64)) {
            let mut list = ReplacementList::new();
            for (k, &b) in sizes.iter().enumerate() {
                list.add_sorted_by_size(ImageId(k as u32), b);
            }
            let max = sizes.iter().copied().max().unwrap();
            prop_assert_eq!(list.peek_end().map(|(_, b)| b), Some(max));
        }
    }
}
