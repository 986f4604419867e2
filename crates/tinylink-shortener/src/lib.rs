//! URL shortener service implementation.
//!
//! This crate provides [`ShortenerService`], which ties a code
//! [`Generator`](tinylink_generator::Generator) to a
//! [`UrlStore`](tinylink_core::UrlStore). Core types are re-exported from
//! `tinylink_core`.

pub mod service;

pub use service::ShortenerService;
pub use tinylink_core::{ShortCode, ShortenedUrl, Shortener, ShortenerError};
