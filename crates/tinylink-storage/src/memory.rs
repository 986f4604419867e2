use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tinylink_core::store::Result;
use tinylink_core::{ShortCode, ShortenedUrl, StorageError, UrlStore};
use tracing::trace;

/// In-memory implementation of [`UrlStore`].
///
/// All records live in a single map behind one reader/writer lock. Reads
/// share the lock; saves and increments hold it exclusively for the whole
/// read-modify-write, so increments never lose updates.
///
/// There is no eviction and no capacity bound. Cloning the store shares the
/// underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    storage: Arc<RwLock<HashMap<String, ShortenedUrl>>>,
}

impl InMemoryStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory store with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::with_capacity(capacity))),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.storage.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.read().is_empty()
    }

    pub fn contains(&self, code: &ShortCode) -> bool {
        self.storage.read().contains_key(code.as_str())
    }

    /// Returns a copy of the record without going through the async contract.
    pub fn peek(&self, code: &ShortCode) -> Option<ShortenedUrl> {
        self.storage.read().get(code.as_str()).cloned()
    }
}

#[async_trait]
impl UrlStore for InMemoryStore {
    async fn save(&self, url: &ShortenedUrl) -> Result<()> {
        trace!(code = %url.short_code, "Saving record in memory");
        self.storage
            .write()
            .insert(url.short_code.as_str().to_owned(), url.clone());
        Ok(())
    }

    async fn get(&self, code: &ShortCode) -> Result<ShortenedUrl> {
        self.storage
            .read()
            .get(code.as_str())
            .cloned()
            .ok_or_else(|| StorageError::NotFound(code.to_string()))
    }

    async fn increment_access_count(&self, code: &ShortCode) -> Result<()> {
        let mut storage = self.storage.write();
        let url = storage
            .get_mut(code.as_str())
            .ok_or_else(|| StorageError::NotFound(code.to_string()))?;
        url.access_count += 1;
        trace!(code = %code, access_count = url.access_count, "Incremented access count in memory");
        Ok(())
    }
}
