mod cli;

use crate::cli::{Command, LogFormatArg, StorageBackendArg, CLI};
use anyhow::anyhow;
use clap::Parser;
use tinylink_core::{ShortCode, Shortener, ShortenerError, UrlStore};
use tinylink_generator::HashidsGenerator;
use tinylink_shortener::ShortenerService;
use tinylink_storage::{InMemoryStore, RedisStore, TieredStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    info!(
        storage_backend = %config.storage,
        max_retries = config.max_retries,
        "starting tinylink"
    );

    let generator = HashidsGenerator::new(config.generator_settings())?;

    match config.storage {
        StorageBackendArg::InMemory => run(&config, InMemoryStore::new(), generator).await,
        StorageBackendArg::Redis => {
            let store = RedisStore::connect(&config.redis_settings()).await?;
            run(&config, store, generator).await
        }
        StorageBackendArg::Tiered => {
            let persistent = RedisStore::connect(&config.redis_settings()).await?;
            let store = TieredStore::new(InMemoryStore::new(), persistent);
            run(&config, store, generator).await
        }
    }
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormatArg::Text => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}

async fn run<R: UrlStore>(
    config: &CLI,
    store: R,
    generator: HashidsGenerator,
) -> anyhow::Result<()> {
    let service =
        ShortenerService::new(store, generator).with_max_retries(config.max_retries);

    let outcome = match &config.command {
        Command::Shorten { urls } => {
            let failed = shorten_all(&service, &config.base_url, urls).await;
            match failed {
                0 => Ok(()),
                _ => Err(anyhow!("{failed} of {} urls could not be shortened", urls.len())),
            }
        }
        Command::Resolve { codes } => {
            let failed = resolve_all(&service, codes).await;
            match failed {
                0 => Ok(()),
                _ => Err(anyhow!("{failed} of {} codes could not be resolved", codes.len())),
            }
        }
        Command::Shell => shell(&service, &config.base_url).await,
    };

    // Access counts are recorded in the background; let them land before exit.
    service.shutdown().await;
    outcome
}

/// Returns the number of failures.
async fn shorten_all(service: &impl Shortener, base_url: &str, urls: &[String]) -> usize {
    let mut failed = 0;
    for url in urls {
        match service.shorten(url).await {
            Ok(shortened) => println!(
                "{}\t{}",
                shortened.short_code,
                shortened.short_code.to_url(base_url)
            ),
            Err(e) => {
                eprintln!("{url}: {e}");
                failed += 1;
            }
        }
    }
    failed
}

/// Returns the number of failures.
async fn resolve_all(service: &impl Shortener, codes: &[String]) -> usize {
    let mut failed = 0;
    for code in codes {
        let resolved = match ShortCode::new(code.as_str()) {
            Ok(code) => service.resolve(&code).await,
            Err(e) => Err(e.into()),
        };
        match resolved {
            Ok(original_url) => println!("{original_url}"),
            Err(e) => {
                eprintln!("{}", describe_resolve_error(code, &e));
                failed += 1;
            }
        }
    }
    failed
}

/// A malformed code can never have been issued, so it reads as not found.
fn describe_resolve_error(code: &str, error: &ShortenerError) -> String {
    match error {
        ShortenerError::NotFound(_) | ShortenerError::InvalidShortCode(_) => {
            format!("{code}: not found")
        }
        e => format!("{code}: {e}"),
    }
}

async fn shell(service: &impl Shortener, base_url: &str) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, argument) = line.split_once(' ').unwrap_or((line, ""));
        let argument = argument.trim().to_string();

        match command {
            "" => continue,
            "quit" | "exit" => break,
            "shorten" if !argument.is_empty() => {
                shorten_all(service, base_url, &[argument]).await;
            }
            "resolve" if !argument.is_empty() => {
                resolve_all(service, &[argument]).await;
            }
            _ => eprintln!("usage: shorten <url> | resolve <code> | quit"),
        }
    }

    Ok(())
}
