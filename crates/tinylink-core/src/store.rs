use crate::error::StorageError;
use crate::shortcode::ShortCode;
use crate::url::ShortenedUrl;
use async_trait::async_trait;
use std::sync::Arc;

/// Type alias for store results.
pub type Result<T> = std::result::Result<T, StorageError>;

/// The storage contract implemented by every backend.
///
/// Records are keyed by [`ShortenedUrl::short_code`]. Implementations can be
/// local (an in-memory map), remote (Redis), or composites of other stores.
#[async_trait]
pub trait UrlStore: Send + Sync + 'static {
    /// Upserts a record by its short code.
    ///
    /// Saving the same code twice overwrites the previous record.
    async fn save(&self, url: &ShortenedUrl) -> Result<()>;

    /// Retrieves the record for a given short code.
    ///
    /// Returns `Err(StorageError::NotFound)` if the code does not exist.
    async fn get(&self, code: &ShortCode) -> Result<ShortenedUrl>;

    /// Increments the access count of a record by exactly one.
    ///
    /// Returns `Err(StorageError::NotFound)` if the code does not exist.
    async fn increment_access_count(&self, code: &ShortCode) -> Result<()>;

    /// Checks whether a short code is present in the store.
    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        match self.get(code).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<S: UrlStore + ?Sized> UrlStore for Arc<S> {
    async fn save(&self, url: &ShortenedUrl) -> Result<()> {
        (**self).save(url).await
    }

    async fn get(&self, code: &ShortCode) -> Result<ShortenedUrl> {
        (**self).get(code).await
    }

    async fn increment_access_count(&self, code: &ShortCode) -> Result<()> {
        (**self).increment_access_count(code).await
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        (**self).exists(code).await
    }
}
