use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tinylink_core::store::Result;
use tinylink_core::{ShortCode, ShortenedUrl, StorageError, UrlStore};
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

/// Default key prefix for stored records.
pub const DEFAULT_KEY_PREFIX: &str = "tinylink:url:";

/// Default time-to-live applied on every write.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Increments `access_count` inside Redis so concurrent increments on the
/// same key serialize on the server. Re-applies the TTL like a save does.
///
/// Returns the new count, `0` for a missing key, `-1` for an undecodable value.
///
/// Redis' bundled `cjson` encodes numbers with 14 significant digits, so a
/// count at or above `1e14` would be written in exponent form and later read
/// back as [`StorageError::Corrupt`]. Such counts are refused with `-2`
/// before anything is written.
const INCREMENT_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
  return 0
end
local ok, record = pcall(cjson.decode, raw)
if not ok or type(record) ~= 'table' or type(record['access_count']) ~= 'number' then
  return -1
end
if record['access_count'] + 1 >= 1e14 then
  return -2
end
record['access_count'] = record['access_count'] + 1
local encoded = cjson.encode(record)
local ttl_ms = tonumber(ARGV[1])
if ttl_ms > 0 then
  redis.call('SET', KEYS[1], encoded, 'PX', ttl_ms)
else
  redis.call('SET', KEYS[1], encoded)
end
return record['access_count']
"#;

/// Connection and storage settings for [`RedisStore`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tinylink_storage::RedisSettings;
///
/// let settings = RedisSettings::builder()
///     .addr("cache.internal:6379")
///     .password("secret")
///     .database(2)
///     .ttl(Some(Duration::from_secs(3600)))
///     .build();
///
/// assert_eq!(settings.connection_url(), "redis://:secret@cache.internal:6379/2");
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct RedisSettings {
    /// `host:port` of the Redis server.
    #[builder(default = "127.0.0.1:6379".to_string(), setter(into))]
    pub addr: String,

    /// Password sent with `AUTH`. Must not contain URL-reserved characters.
    #[builder(default, setter(strip_option, into))]
    pub password: Option<String>,

    /// Logical database index.
    #[builder(default = 0)]
    pub database: i64,

    /// Expiry applied on every write; `None` keeps keys forever.
    #[builder(default = Some(DEFAULT_TTL))]
    pub ttl: Option<Duration>,

    #[builder(default = DEFAULT_KEY_PREFIX.to_string(), setter(into))]
    pub key_prefix: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RedisSettings {
    /// Renders the `redis://` connection URL for these settings.
    pub fn connection_url(&self) -> String {
        let auth = match &self.password {
            Some(password) => format!(":{password}@"),
            None => String::new(),
        };
        format!("redis://{auth}{}/{}", self.addr, self.database)
    }
}

/// A Redis-backed implementation of [`UrlStore`].
///
/// Records are stored as JSON strings under `key_prefix + short_code`, with
/// the configured TTL refreshed on every write. Expiry is enforced by Redis:
/// once a key lapses, [`get`](UrlStore::get) reports `NotFound`.
#[derive(Debug, Clone)]
pub struct RedisStore {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
    ttl: Option<Duration>,
    increment: redis::Script,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> StorageError {
    StorageError::Unavailable(format!("{operation}: {err}"))
}

/// Milliseconds passed to `PX`; `0` means no expiry.
fn ttl_millis(ttl: Option<Duration>) -> u64 {
    ttl.map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1))
        .unwrap_or(0)
}

impl RedisStore {
    /// Creates a store on top of an existing multiplexed connection.
    ///
    /// Only `ttl` and `key_prefix` are read from `settings`; the connection
    /// is assumed to already target the right server and database.
    pub fn new(conn: redis::aio::MultiplexedConnection, settings: &RedisSettings) -> Self {
        Self {
            conn,
            key_prefix: settings.key_prefix.clone(),
            ttl: settings.ttl,
            increment: redis::Script::new(INCREMENT_SCRIPT),
        }
    }

    /// Opens a new client from `settings` and creates a store on it.
    pub async fn connect(settings: &RedisSettings) -> Result<Self> {
        let client = redis::Client::open(settings.connection_url())
            .map_err(|e| map_redis_error("failed to open Redis client", e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        debug!(addr = %settings.addr, database = settings.database, "Connected to Redis");
        Ok(Self::new(conn, settings))
    }

    /// Returns the TTL applied on writes.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Generates the storage key for a short code.
    fn storage_key(&self, code: &ShortCode) -> String {
        format!("{}{}", self.key_prefix, code.as_str())
    }
}

#[async_trait]
impl UrlStore for RedisStore {
    async fn save(&self, url: &ShortenedUrl) -> Result<()> {
        let key = self.storage_key(&url.short_code);
        trace!(code = %url.short_code, "Storing record in Redis");

        let json = serde_json::to_string(url).map_err(|e| {
            warn!(code = %url.short_code, error = %e, "Failed to serialize record");
            StorageError::Serialization(format!("failed to serialize record: {e}"))
        })?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(json);
        let ttl_ms = ttl_millis(self.ttl);
        if ttl_ms > 0 {
            cmd.arg("PX").arg(ttl_ms);
        }

        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = cmd.query_async(&mut conn).await;
        match result {
            Ok(()) => {
                debug!(code = %url.short_code, "Stored record in Redis");
                Ok(())
            }
            Err(e) => {
                warn!(code = %url.short_code, error = %e, "Failed to store record in Redis");
                Err(map_redis_error("failed to write value to Redis", e))
            }
        }
    }

    async fn get(&self, code: &ShortCode) -> Result<ShortenedUrl> {
        let key = self.storage_key(code);
        trace!(code = %code, "Fetching record from Redis");

        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(raw)) => {
                debug!(code = %code, "Hit in Redis");
                serde_json::from_str::<ShortenedUrl>(&raw).map_err(|e| {
                    warn!(code = %code, error = %e, "Failed to deserialize stored record");
                    StorageError::Corrupt(format!("invalid value for key '{key}': {e}"))
                })
            }
            Ok(None) => {
                trace!(code = %code, "Miss in Redis");
                Err(StorageError::NotFound(code.to_string()))
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Redis error on get");
                Err(map_redis_error("failed to fetch value from Redis", e))
            }
        }
    }

    async fn increment_access_count(&self, code: &ShortCode) -> Result<()> {
        let key = self.storage_key(code);
        trace!(code = %code, "Incrementing access count in Redis");

        let mut conn = self.conn.clone();
        let outcome: i64 = self
            .increment
            .key(&key)
            .arg(ttl_millis(self.ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(code = %code, error = %e, "Redis error on increment");
                map_redis_error("failed to increment access count in Redis", e)
            })?;

        match outcome {
            0 => Err(StorageError::NotFound(code.to_string())),
            -2 => Err(StorageError::Serialization(format!(
                "access count for key '{key}' is too large to re-encode"
            ))),
            n if n < 0 => Err(StorageError::Corrupt(format!(
                "value for key '{key}' has no numeric access_count"
            ))),
            n => {
                debug!(code = %code, access_count = n, "Incremented access count in Redis");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings() {
        let settings = RedisSettings::default();
        assert_eq!(settings.addr, "127.0.0.1:6379");
        assert_eq!(settings.database, 0);
        assert_eq!(settings.ttl, Some(DEFAULT_TTL));
        assert_eq!(settings.key_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(settings.connection_url(), "redis://127.0.0.1:6379/0");
    }

    #[test]
    fn connection_url_with_password_and_database() {
        let settings = RedisSettings::builder()
            .addr("10.0.0.5:6380")
            .password("hunter2")
            .database(3)
            .build();
        assert_eq!(settings.connection_url(), "redis://:hunter2@10.0.0.5:6380/3");
    }

    #[test]
    fn ttl_is_rendered_in_milliseconds() {
        assert_eq!(ttl_millis(None), 0);
        assert_eq!(ttl_millis(Some(Duration::from_secs(2))), 2_000);
        // A zero TTL would be rejected by Redis, clamp to the smallest expiry.
        assert_eq!(ttl_millis(Some(Duration::ZERO)), 1);
    }
}
