use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tinylink_generator::{GeneratorSettings, DEFAULT_MAX_RETRIES};
use tinylink_storage::RedisSettings;

pub const STORAGE_BACKEND_ENV: &str = "TINYLINK_STORAGE_BACKEND";
pub const REDIS_ADDR_ENV: &str = "TINYLINK_REDIS_ADDR";
pub const REDIS_PASSWORD_ENV: &str = "TINYLINK_REDIS_PASSWORD";
pub const REDIS_DB_ENV: &str = "TINYLINK_REDIS_DB";
pub const CACHE_TTL_SECS_ENV: &str = "TINYLINK_CACHE_TTL_SECS";
pub const CODE_SALT_ENV: &str = "TINYLINK_CODE_SALT";
pub const MAX_RETRIES_ENV: &str = "TINYLINK_MAX_RETRIES";
pub const BASE_URL_ENV: &str = "TINYLINK_BASE_URL";
pub const LOG_FORMAT_ENV: &str = "TINYLINK_LOG_FORMAT";

pub const DEFAULT_REDIS_ADDR: &str = "127.0.0.1:6379";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_CODE_SALT: &str = "tinylink";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    /// Process-local map; contents are lost on exit.
    #[value(name = "in-memory")]
    InMemory,
    /// Redis only.
    #[value(name = "redis")]
    Redis,
    /// In-memory fast tier in front of Redis.
    #[value(name = "tiered")]
    Tiered,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Redis => write!(f, "redis"),
            StorageBackendArg::Tiered => write!(f, "tiered"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one or more URLs.
    Shorten {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Print the original URL for one or more short codes.
    Resolve {
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Read `shorten <url>` / `resolve <code>` lines from stdin.
    Shell,
}

#[derive(Debug, Parser)]
#[command(name = "tinylink", about = "Shorten URLs and resolve short codes")]
pub struct CLI {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = REDIS_ADDR_ENV, default_value = DEFAULT_REDIS_ADDR)]
    pub redis_addr: String,

    #[arg(long, env = REDIS_PASSWORD_ENV, hide_env_values = true)]
    pub redis_password: Option<String>,

    #[arg(long, env = REDIS_DB_ENV, default_value_t = 0)]
    pub redis_db: i64,

    /// Expiry of Redis keys in seconds, `0` disables expiry.
    #[arg(long, env = CACHE_TTL_SECS_ENV, default_value_t = DEFAULT_CACHE_TTL_SECS)]
    pub cache_ttl_secs: u64,

    #[arg(long, env = CODE_SALT_ENV, default_value = DEFAULT_CODE_SALT, hide_env_values = true)]
    pub code_salt: String,

    #[arg(long, env = MAX_RETRIES_ENV, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Public prefix used to print full short links.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Command,
}

impl CLI {
    pub fn redis_settings(&self) -> RedisSettings {
        let ttl = match self.cache_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let mut settings = RedisSettings::builder()
            .addr(self.redis_addr.clone())
            .database(self.redis_db)
            .ttl(ttl)
            .build();
        settings.password = self.redis_password.clone();
        settings
    }

    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings::builder()
            .salt(self.code_salt.clone())
            .build()
    }
}
