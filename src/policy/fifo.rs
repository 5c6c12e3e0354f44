//! First In, First Out (FIFO) policy.
//!
//! Images enter at the front and leave from the end in insertion order.
//! Accesses never reorder the list.

use crate::image::ImageId;
use crate::list::ReplacementList;
use crate::policy::{ReplacementPolicy, ReplacementPolicyKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct FifoPolicy;

impl ReplacementPolicy for FifoPolicy {
    fn kind(&self) -> ReplacementPolicyKind {
        ReplacementPolicyKind::Fifo
    }

    fn order_on_insert(&self, list: &mut ReplacementList, id: ImageId, bytes: usize) -> bool {
        list.add_at_front(id, bytes)
    }
}
