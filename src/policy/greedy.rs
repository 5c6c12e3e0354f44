//! Greedy (largest first) policy.
//!
//! The list is kept sorted by ascending size, so the end always holds the
//! largest image. Each eviction step removes the single largest entry,
//! which minimizes the number of unloads needed to reach a byte target at
//! the price of discarding large images that may still be useful.

use crate::image::ImageId;
use crate::list::ReplacementList;
use crate::policy::{ReplacementPolicy, ReplacementPolicyKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyPolicy;

impl ReplacementPolicy for GreedyPolicy {
    fn kind(&self) -> ReplacementPolicyKind {
        ReplacementPolicyKind::Greedy
    }

    fn order_on_insert(&self, list: &mut ReplacementList, id: ImageId, bytes: usize) -> bool {
        list.add_sorted_by_size(id, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn largest_is_candidate_regardless_of_order() {
        let policy = GreedyPolicy;
        let mut list = ReplacementList::new();
        policy.order_on_insert(&mut list, ImageId(1), 10 * 1024);
        policy.order_on_insert(&mut list, ImageId(2), 50 * 1024);
        policy.order_on_insert(&mut list, ImageId(3), 5 * 1024);

        assert_eq!(policy.select_eviction_candidate(&list), Some(ImageId(2)));
        assert!(!policy.order_on_access(&mut list, ImageId(3)));
        assert_eq!(policy.select_eviction_candidate(&list), Some(ImageId(2)));
    }
}
