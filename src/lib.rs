//! polycache: in-process caches with interchangeable eviction policies.
//!
//! One [`Cache`] handle fronts an LRU, LFU, ARC or Simple store chosen at
//! build time through [`CacheBuilder`], with per-entry expiration,
//! single-flight loading, hit/miss statistics and an optional janitor.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod builder;
pub mod cache;
pub mod clock;
pub mod ds;
pub mod error;
pub mod item;
mod janitor;
mod load;
pub mod policy;
pub mod prelude;
pub mod stats;
pub mod store;

pub use builder::{CacheBuilder, CachePolicy};
pub use cache::Cache;
pub use clock::Clock;
pub use error::{CacheError, ConfigError, LoadError};
pub use item::Expiration;
pub use stats::StatsSnapshot;
