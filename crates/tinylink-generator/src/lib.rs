//! Short code derivation for tinylink.
//!
//! Generators are pure: they never look at storage. Collision checks and the
//! retry budget belong to the caller, which asks for the candidate of attempt
//! `0`, `1`, ... until one is free.

pub mod hashids;

use thiserror::Error;
use tinylink_core::ShortCode;

pub use hashids::{GeneratorSettings, HashidsGenerator};

/// Number of candidates tried before giving up on a URL.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, Error)]
pub enum GeneratorError {
    #[error("invalid generator settings: {0}")]
    InvalidSettings(String),
}

/// Trait for deriving candidate short codes.
///
/// For the same `original_url` and `attempt`, an implementation must always
/// return the same code, and different attempts should spread over the code
/// space so that a collision can be resolved by moving to the next attempt.
pub trait Generator: Send + Sync + 'static {
    /// Derives the candidate short code for `original_url` at retry `attempt`.
    fn candidate(&self, original_url: &str, attempt: u32) -> ShortCode;
}
