use crate::shortcode::ShortCode;
use crate::url::ShortenedUrl;
use async_trait::async_trait;

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// The service contract exposed to transports.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Creates a shortened URL with a collision-free short code and returns
    /// the stored record.
    async fn shorten(&self, original_url: &str) -> Result<ShortenedUrl>;

    /// Resolves a short code to its original URL, recording the access.
    ///
    /// Returns `Err(ShortenerError::NotFound)` if the code does not exist.
    async fn resolve(&self, code: &ShortCode) -> Result<String>;
}
