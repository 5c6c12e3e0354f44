//! # Least Recently Used (LRU) policy
//!
//! ```text
//!   insert(D):                     access(B):
//!     [D] [C] [B] [A]                [B] [D] [C] [A]
//!     MRU          LRU ─► evict      MRU          LRU ─► evict
//! ```
//!
//! New images enter at the front, every draw-time access moves the image
//! back to the front, and the end holds the least recently used image.
//! On a free list whose entries are never drawn, LRU and FIFO coincide.

use crate::image::ImageId;
use crate::list::ReplacementList;
use crate::policy::{ReplacementPolicy, ReplacementPolicyKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct LruPolicy;

impl ReplacementPolicy for LruPolicy {
    fn kind(&self) -> ReplacementPolicyKind {
        ReplacementPolicyKind::Lru
    }

    fn order_on_insert(&self, list: &mut ReplacementList, id: ImageId, bytes: usize) -> bool {
        list.add_at_front(id, bytes)
    }

    fn order_on_access(&self, list: &mut ReplacementList, id: ImageId) -> bool {
        list.bring_to_front(id)
    }
}
