//! Core types and traits for the tinylink URL shortener.
//!
//! This crate provides the entity, the short code key, the error taxonomy
//! and the two contracts shared by every other crate: [`UrlStore`] for
//! storage backends and [`Shortener`] for the service exposed to transports.

pub mod error;
pub mod shortcode;
pub mod shortener;
pub mod store;
pub mod url;

pub use error::{CoreError, ShortenerError, StorageError};
pub use shortcode::ShortCode;
pub use shortener::Shortener;
pub use store::UrlStore;
pub use url::ShortenedUrl;
