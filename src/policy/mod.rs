//! # Replacement Policies
//!
//! A replacement policy decides where an image enters a
//! [`ReplacementList`], whether an access reorders it, and which entry is
//! the next eviction candidate. Policies hold no per-entry state: all
//! ordering lives in the list, so swapping a policy only requires
//! re-inserting the existing entries under the new rule.
//!
//! ## Variants
//!
//! | Kind     | Ordinal | Insert             | Access         | Candidate            |
//! |----------|---------|--------------------|----------------|----------------------|
//! | `Dummy`  | 0       | front              | no-op          | none (never evicts)  |
//! | `Greedy` | 1       | ascending by size  | no-op          | largest image        |
//! | `Fifo`   | 2       | front              | no-op          | earliest inserted    |
//! | `Lru`    | 3       | front              | bring to front | least recently used  |
//!
//! The ordinal is the value persisted in cache configuration files.
//!
//! ## Example
//!
//! ```
//! use imgcache::image::ImageId;
//! use imgcache::list::ReplacementList;
//! use imgcache::policy::{ReplacementPolicyKind, create_policy};
//!
//! let policy = create_policy(ReplacementPolicyKind::Greedy);
//! let mut list = ReplacementList::new();
//! policy.order_on_insert(&mut list, ImageId(1), 10_000);
//! policy.order_on_insert(&mut list, ImageId(2), 50_000);
//! policy.order_on_insert(&mut list, ImageId(3), 5_000);
//! assert_eq!(policy.select_eviction_candidate(&list), Some(ImageId(2)));
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::image::ImageId;
use crate::list::ReplacementList;

pub mod dummy;
pub mod fifo;
pub mod greedy;
pub mod lru;

pub use dummy::DummyPolicy;
pub use fifo::FifoPolicy;
pub use greedy::GreedyPolicy;
pub use lru::LruPolicy;

/// Identifies a built-in replacement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum ReplacementPolicyKind {
    /// Images can be added, but are never selected for eviction.
    Dummy = 0,
    /// Evict the largest image first.
    Greedy = 1,
    /// First in, first out.
    Fifo = 2,
    /// Least recently used.
    #[default]
    Lru = 3,
}

impl ReplacementPolicyKind {
    pub const ALL: [ReplacementPolicyKind; 4] = [
        ReplacementPolicyKind::Dummy,
        ReplacementPolicyKind::Greedy,
        ReplacementPolicyKind::Fifo,
        ReplacementPolicyKind::Lru,
    ];

    /// The value stored in configuration files.
    pub const fn ordinal(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            ReplacementPolicyKind::Dummy => "dummy",
            ReplacementPolicyKind::Greedy => "greedy",
            ReplacementPolicyKind::Fifo => "fifo",
            ReplacementPolicyKind::Lru => "lru",
        }
    }
}

impl TryFrom<u32> for ReplacementPolicyKind {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.ordinal() == value)
            .ok_or_else(|| ConfigError::new(format!("unknown replacement policy ordinal {value}")))
    }
}

impl FromStr for ReplacementPolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ConfigError::new(format!("unknown replacement policy '{trimmed}'")))
    }
}

impl fmt::Display for ReplacementPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordering strategy for one replacement list.
pub trait ReplacementPolicy: Send + fmt::Debug {
    fn kind(&self) -> ReplacementPolicyKind;

    /// Inserts `id` at the position this policy prescribes.
    /// Returns `false` if the list already holds `id`.
    fn order_on_insert(&self, list: &mut ReplacementList, id: ImageId, bytes: usize) -> bool;

    /// Reacts to a draw-time access. Returns `true` if the list changed.
    fn order_on_access(&self, _list: &mut ReplacementList, _id: ImageId) -> bool {
        false
    }

    /// Returns the entry that should be evicted next, without removing it.
    fn select_eviction_candidate(&self, list: &ReplacementList) -> Option<ImageId> {
        list.peek_end().map(|(id, _)| id)
    }
}

/// Creates the built-in policy for `kind`.
pub fn create_policy(kind: ReplacementPolicyKind) -> Box<dyn ReplacementPolicy> {
    match kind {
        ReplacementPolicyKind::Dummy => Box::new(DummyPolicy),
        ReplacementPolicyKind::Greedy => Box::new(GreedyPolicy),
        ReplacementPolicyKind::Fifo => Box::new(FifoPolicy),
        ReplacementPolicyKind::Lru => Box::new(LruPolicy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_match_persisted_values() {
        assert_eq!(ReplacementPolicyKind::Dummy.ordinal(), 0);
        assert_eq!(ReplacementPolicyKind::Greedy.ordinal(), 1);
        assert_eq!(ReplacementPolicyKind::Fifo.ordinal(), 2);
        assert_eq!(ReplacementPolicyKind::Lru.ordinal(), 3);
    }

    #[test]
    fn ordinal_round_trip_and_rejection() {
        for kind in ReplacementPolicyKind::ALL {
            assert_eq!(ReplacementPolicyKind::try_from(kind.ordinal()), Ok(kind));
        }
        let err = ReplacementPolicyKind::try_from(4).unwrap_err();
        assert!(err.message().contains('4'));
    }

    #[test]
    fn parse_names_case_insensitive() {
        assert_eq!("LRU".parse(), Ok(ReplacementPolicyKind::Lru));
        assert_eq!(" fifo ".parse(), Ok(ReplacementPolicyKind::Fifo));
        assert_eq!("Greedy".parse(), Ok(ReplacementPolicyKind::Greedy));
        assert!("clock".parse::<ReplacementPolicyKind>().is_err());
        assert_eq!(ReplacementPolicyKind::Greedy.to_string(), "greedy");
    }

    #[test]
    fn factory_builds_matching_kind() {
        for kind in ReplacementPolicyKind::ALL {
            assert_eq!(create_policy(kind).kind(), kind);
        }
        assert_eq!(ReplacementPolicyKind::default(), ReplacementPolicyKind::Lru);
    }
}
