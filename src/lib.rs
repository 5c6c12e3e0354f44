//! imgcache: byte-budgeted image resource cache with pluggable replacement
//! policies.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod backend;
pub mod builder;
pub mod cache;
pub mod config;
pub mod ds;
pub mod error;
pub mod image;
pub mod list;
pub mod loader;
pub mod policy;
pub mod resource;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;
