//! Storage backends for tinylink.
//!
//! Every backend implements [`tinylink_core::UrlStore`]:
//!
//! - [`InMemoryStore`]: a lock-guarded map, used standalone or as a local fast tier.
//! - [`RedisStore`]: a remote store with a time-to-live, records serialized as JSON.
//! - [`TieredStore`]: a fast store in front of a persistent one, with
//!   read-through, write-through and detached fast-tier repair.

pub mod memory;
pub mod redis;
pub mod tiered;

pub use memory::InMemoryStore;
pub use crate::redis::{RedisSettings, RedisStore};
pub use tiered::TieredStore;
