//! Policy that accepts images but never offers one for eviction.
//!
//! Useful for a used list that should only be ordered, or for a free list
//! that must pin every cached image.

use crate::image::ImageId;
use crate::list::ReplacementList;
use crate::policy::{ReplacementPolicy, ReplacementPolicyKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct DummyPolicy;

impl ReplacementPolicy for DummyPolicy {
    fn kind(&self) -> ReplacementPolicyKind {
        ReplacementPolicyKind::Dummy
    }

    fn order_on_insert(&self, list: &mut ReplacementList, id: ImageId, bytes: usize) -> bool {
        list.add_at_front(id, bytes)
    }

    fn select_eviction_candidate(&self, _list: &ReplacementList) -> Option<ImageId> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_selects_candidate() {
        let policy = DummyPolicy;
        let mut list = ReplacementList::new();
        assert!(policy.order_on_insert(&mut list, ImageId(1), 10));
        assert_eq!(list.quantity(), 1);
        assert_eq!(policy.select_eviction_candidate(&list), None);
    }
}
