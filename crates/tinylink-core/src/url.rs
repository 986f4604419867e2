use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A shortened URL as stored by every [`UrlStore`](crate::UrlStore) backend.
///
/// Everything except `access_count` is fixed at creation. The serialized
/// form is the wire format used by remote backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortenedUrl {
    pub id: Uuid,
    /// The original URL that was shortened.
    pub original_url: String,
    /// The lookup key.
    pub short_code: ShortCode,
    pub created_at: Timestamp,
    /// Number of successful resolutions recorded so far.
    pub access_count: u64,
}

impl ShortenedUrl {
    /// Creates a fresh record with a new id, the current time and a zero access count.
    pub fn new(original_url: impl Into<String>, short_code: ShortCode) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_url: original_url.into(),
            short_code,
            created_at: Timestamp::now(),
            access_count: 0,
        }
    }
}
