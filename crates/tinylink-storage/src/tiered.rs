use async_trait::async_trait;
use std::sync::Arc;
use tinylink_core::store::Result;
use tinylink_core::{ShortCode, ShortenedUrl, StorageError, UrlStore};
use tracing::{debug, trace, warn};

/// A two-tier store that puts a fast store in front of a persistent one.
///
/// The persistent tier is authoritative; the fast tier holds a derived copy
/// that may be stale or missing at any time.
///
/// # Operation Strategy
///
/// - **Save**: write to persistent synchronously. Only on success, write to
///   fast in a detached task.
/// - **Get**: try fast first. On miss or error, read persistent and, on a
///   hit, repopulate fast in a detached task.
/// - **Increment**: increment persistent synchronously, then mirror the
///   increment onto fast in a detached task.
///
/// Detached tasks run on the ambient tokio runtime and are never awaited.
/// Their failures are logged and never reach the caller, so a durable write
/// followed by a failed fast write is a permanent partial state.
///
/// # Example
///
/// ```rust
/// use tinylink_core::{ShortCode, ShortenedUrl, UrlStore};
/// use tinylink_storage::{InMemoryStore, TieredStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = TieredStore::new(InMemoryStore::new(), InMemoryStore::new());
///
/// let url = ShortenedUrl::new("https://example.com", ShortCode::new("abc1234")?);
/// store.save(&url).await?;
///
/// assert_eq!(store.get(&url.short_code).await?, url);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TieredStore<F, P> {
    fast: Arc<F>,
    persistent: P,
}

impl<F, P> TieredStore<F, P> {
    /// Creates a new tiered store.
    ///
    /// # Arguments
    ///
    /// * `fast` - The advisory store consulted first on reads
    /// * `persistent` - The authoritative store of record
    pub fn new(fast: F, persistent: P) -> Self {
        Self {
            fast: Arc::new(fast),
            persistent,
        }
    }

    /// Returns a reference to the fast tier.
    pub fn fast(&self) -> &F {
        &self.fast
    }

    /// Returns a reference to the persistent tier.
    pub fn persistent(&self) -> &P {
        &self.persistent
    }
}

impl<F: UrlStore, P: UrlStore> TieredStore<F, P> {
    /// Writes `url` to the fast tier without waiting for the result.
    fn populate_fast(&self, url: ShortenedUrl) {
        let fast = Arc::clone(&self.fast);
        tokio::spawn(async move {
            match fast.save(&url).await {
                Ok(()) => trace!(code = %url.short_code, "Populated fast tier"),
                Err(e) => {
                    warn!(code = %url.short_code, error = %e, "Failed to populate fast tier")
                }
            }
        });
    }

    /// Mirrors an increment onto the fast tier without waiting for the result.
    fn mirror_increment(&self, code: ShortCode) {
        let fast = Arc::clone(&self.fast);
        tokio::spawn(async move {
            match fast.increment_access_count(&code).await {
                Ok(()) => trace!(code = %code, "Mirrored access count to fast tier"),
                // Not cached yet; the next repair brings the persistent count along.
                Err(StorageError::NotFound(_)) => {
                    debug!(code = %code, "Code not in fast tier, skipping increment mirror")
                }
                Err(e) => {
                    warn!(code = %code, error = %e, "Failed to mirror access count to fast tier")
                }
            }
        });
    }
}

#[async_trait]
impl<F: UrlStore, P: UrlStore> UrlStore for TieredStore<F, P> {
    async fn save(&self, url: &ShortenedUrl) -> Result<()> {
        trace!(code = %url.short_code, "Saving record through tiered store");

        self.persistent.save(url).await?;
        debug!(code = %url.short_code, "Stored in persistent tier");

        self.populate_fast(url.clone());
        Ok(())
    }

    async fn get(&self, code: &ShortCode) -> Result<ShortenedUrl> {
        trace!(code = %code, "Fetching record through tiered store");

        match self.fast.get(code).await {
            Ok(url) => {
                debug!(code = %code, "Fast tier hit");
                return Ok(url);
            }
            Err(StorageError::NotFound(_)) => {
                trace!(code = %code, "Fast tier miss, trying persistent tier");
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Fast tier error on get, falling back to persistent tier");
            }
        }

        let url = self.persistent.get(code).await?;
        debug!(code = %code, "Persistent tier hit, repairing fast tier");

        self.populate_fast(url.clone());
        Ok(url)
    }

    async fn increment_access_count(&self, code: &ShortCode) -> Result<()> {
        trace!(code = %code, "Incrementing access count through tiered store");

        self.persistent.increment_access_count(code).await?;

        self.mirror_increment(code.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;
    use std::time::Duration;

    /// A store whose every operation fails as if the backend were down.
    struct UnavailableStore;

    #[async_trait]
    impl UrlStore for UnavailableStore {
        async fn save(&self, _url: &ShortenedUrl) -> Result<()> {
            Err(StorageError::Unavailable("connection refused".to_string()))
        }

        async fn get(&self, _code: &ShortCode) -> Result<ShortenedUrl> {
            Err(StorageError::Unavailable("connection refused".to_string()))
        }

        async fn increment_access_count(&self, _code: &ShortCode) -> Result<()> {
            Err(StorageError::Unavailable("connection refused".to_string()))
        }
    }

    /// A store holding values it can no longer decode.
    struct CorruptStore;

    #[async_trait]
    impl UrlStore for CorruptStore {
        async fn save(&self, _url: &ShortenedUrl) -> Result<()> {
            Ok(())
        }

        async fn get(&self, code: &ShortCode) -> Result<ShortenedUrl> {
            Err(StorageError::Corrupt(format!("value for '{code}' is not json")))
        }

        async fn increment_access_count(&self, code: &ShortCode) -> Result<()> {
            Err(StorageError::Corrupt(format!("value for '{code}' is not json")))
        }
    }

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn test_record(c: &str) -> ShortenedUrl {
        ShortenedUrl::new("https://example.com", code(c))
    }

    fn test_store() -> TieredStore<InMemoryStore, InMemoryStore> {
        TieredStore::new(InMemoryStore::new(), InMemoryStore::new())
    }

    async fn eventually(condition: impl Fn() -> bool + Send + Sync) {
        let condition = &condition;
        awaitility::at_most(Duration::from_secs(2))
            .poll_interval(Duration::from_millis(10))
            .until_async(move || async move { condition() })
            .await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn save_writes_persistent_then_fast() {
        let store = test_store();
        let url = test_record("abc1234");

        store.save(&url).await.unwrap();

        // The persistent write is synchronous.
        assert_eq!(store.persistent().peek(&url.short_code), Some(url.clone()));

        let fast = store.fast();
        eventually(|| fast.contains(&url.short_code)).await;
        assert_eq!(fast.peek(&url.short_code), Some(url));
    }

    #[tokio::test]
    async fn save_fails_when_persistent_fails() {
        let store = TieredStore::new(InMemoryStore::new(), UnavailableStore);
        let url = test_record("abc1234");

        let err = store.save(&url).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));

        tokio::task::yield_now().await;
        assert!(store.fast().is_empty());
    }

    #[tokio::test]
    async fn save_succeeds_when_fast_fails() {
        let store = TieredStore::new(UnavailableStore, InMemoryStore::new());
        let url = test_record("abc1234");

        store.save(&url).await.unwrap();
        assert!(store.persistent().contains(&url.short_code));
    }

    #[tokio::test]
    async fn save_twice_keeps_single_latest_record() {
        let store = test_store();
        let first = test_record("abc1234");
        let mut second = test_record("abc1234");
        second.original_url = "https://example.com/updated".to_string();

        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        assert_eq!(store.persistent().len(), 1);
        assert_eq!(
            store.persistent().peek(&second.short_code),
            Some(second.clone())
        );
    }

    #[tokio::test]
    async fn get_from_fast_when_fast_hit() {
        let store = test_store();
        let url = test_record("abc1234");

        // Only the fast tier knows about this record.
        store.fast().save(&url).await.unwrap();

        assert_eq!(store.get(&url.short_code).await.unwrap(), url);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn get_falls_back_to_persistent_and_repairs_fast() {
        let store = test_store();
        let url = test_record("abc1234");
        store.persistent().save(&url).await.unwrap();
        assert!(store.fast().is_empty());

        assert_eq!(store.get(&url.short_code).await.unwrap(), url);

        let fast = store.fast();
        eventually(|| fast.contains(&url.short_code)).await;
        assert_eq!(fast.get(&url.short_code).await.unwrap(), url);
    }

    #[tokio::test]
    async fn get_falls_back_when_fast_errors() {
        let store = TieredStore::new(UnavailableStore, InMemoryStore::new());
        let url = test_record("abc1234");
        store.persistent().save(&url).await.unwrap();

        assert_eq!(store.get(&url.short_code).await.unwrap(), url);
    }

    #[tokio::test]
    async fn get_falls_back_when_fast_is_corrupt() {
        let store = TieredStore::new(CorruptStore, InMemoryStore::new());
        let url = test_record("abc1234");
        store.persistent().save(&url).await.unwrap();

        assert_eq!(store.get(&url.short_code).await.unwrap(), url);

        store.increment_access_count(&url.short_code).await.unwrap();
        assert_eq!(
            store.persistent().peek(&url.short_code).unwrap().access_count,
            1
        );
    }

    #[tokio::test]
    async fn get_propagates_persistent_not_found() {
        let store = test_store();

        let err = store.get(&code("zzzzzzz")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_propagates_persistent_unavailable() {
        let store = TieredStore::new(InMemoryStore::new(), UnavailableStore);

        let err = store.get(&code("abc1234")).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn increment_updates_persistent_and_mirrors_fast() {
        let store = test_store();
        let url = test_record("abc1234");
        store.save(&url).await.unwrap();

        let fast = store.fast();
        eventually(|| fast.contains(&url.short_code)).await;

        store.increment_access_count(&url.short_code).await.unwrap();
        assert_eq!(
            store.persistent().peek(&url.short_code).unwrap().access_count,
            1
        );

        eventually(|| {
            fast.peek(&url.short_code)
                .is_some_and(|cached| cached.access_count == 1)
        })
        .await;
    }

    #[tokio::test]
    async fn increment_not_found_in_persistent() {
        let store = test_store();

        let err = store
            .increment_access_count(&code("zzzzzzz"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn increment_succeeds_when_fast_fails() {
        let store = TieredStore::new(UnavailableStore, InMemoryStore::new());
        let url = test_record("abc1234");
        store.save(&url).await.unwrap();

        store.increment_access_count(&url.short_code).await.unwrap();
        assert_eq!(
            store.persistent().peek(&url.short_code).unwrap().access_count,
            1
        );
    }
}
