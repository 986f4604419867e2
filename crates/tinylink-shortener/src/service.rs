use async_trait::async_trait;
use std::sync::Arc;
use tinylink_core::{ShortCode, ShortenedUrl, Shortener, ShortenerError, UrlStore};
use tinylink_generator::{Generator, DEFAULT_MAX_RETRIES};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

/// A concrete implementation of the [`Shortener`] trait.
///
/// This service wraps a [`UrlStore`] and a [`Generator`] to handle:
/// - URL validation
/// - Collision-checked short code generation with a bounded retry budget
/// - Access accounting on resolution
///
/// Uniqueness is enforced by checking each candidate against the store
/// before writing. Two concurrent requests deriving the same code can both
/// pass the check; the later write wins.
///
/// Access recording runs in tracked background tasks. Call
/// [`shutdown`](Self::shutdown) before the runtime goes away, or pending
/// increments are lost.
#[derive(Debug)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    max_retries: u32,
    tasks: TaskTracker,
}

impl<R, G> Clone for ShortenerService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
            max_retries: self.max_retries,
            tasks: self.tasks.clone(),
        }
    }
}

impl<R: UrlStore, G: Generator> ShortenerService<R, G> {
    /// Creates a new `ShortenerService` with the default retry budget.
    pub fn new(repository: R, generator: G) -> Self {
        Self {
            repository: Arc::new(repository),
            generator: Arc::new(generator),
            max_retries: DEFAULT_MAX_RETRIES,
            tasks: TaskTracker::new(),
        }
    }

    /// Overrides how many candidates are tried before giving up.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns the store shared with background tasks.
    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Waits for every pending access-recording task to finish.
    ///
    /// Resolving after shutdown still works; its tasks are tracked too and a
    /// later call waits for them as well.
    pub async fn shutdown(&self) {
        self.tasks.close();
        debug!(pending = self.tasks.len(), "Draining access-recording tasks");
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Validates that the URL has a valid format (has a scheme and host).
    fn validate_url(url: &str) -> Result<(), ShortenerError> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        // A valid URL should have "://" and something after it
        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {}",
                url
            )));
        };
        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if scheme.is_empty() || host.is_empty() {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {}",
                url
            )));
        }

        let scheme = scheme.to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {}",
                scheme
            )));
        }

        Ok(())
    }

    /// Finds the first candidate code not yet present in the store.
    async fn generate_unique_code(&self, original_url: &str) -> Result<ShortCode, ShortenerError> {
        for attempt in 0..self.max_retries {
            let code = self.generator.candidate(original_url, attempt);
            if !self.repository.exists(&code).await? {
                trace!(code = %code, attempt, "Found free short code");
                return Ok(code);
            }
            debug!(code = %code, attempt, "Short code collision, trying next attempt");
        }

        warn!(attempts = self.max_retries, "No free short code within retry budget");
        Err(ShortenerError::ExhaustedRetries {
            attempts: self.max_retries,
        })
    }

    /// Increments the access count without making the caller wait.
    fn record_access(&self, code: ShortCode) {
        let repository = Arc::clone(&self.repository);
        self.tasks.spawn(async move {
            if let Err(e) = repository.increment_access_count(&code).await {
                warn!(code = %code, error = %e, "Failed to record access");
            }
        });
    }
}

#[async_trait]
impl<R: UrlStore, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, original_url: &str) -> Result<ShortenedUrl, ShortenerError> {
        Self::validate_url(original_url)?;

        let short_code = self.generate_unique_code(original_url).await?;
        let url = ShortenedUrl::new(original_url, short_code);

        self.repository.save(&url).await?;
        info!(code = %url.short_code, id = %url.id, "Shortened URL");

        Ok(url)
    }

    async fn resolve(&self, code: &ShortCode) -> Result<String, ShortenerError> {
        let url = self.repository.get(code).await?;
        trace!(code = %code, "Resolved short code");

        self.record_access(url.short_code.clone());
        Ok(url.original_url)
    }
}
