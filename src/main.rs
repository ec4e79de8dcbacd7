//! Redis Helpers - command-line client for the prefixed cache facade
//!
//! Runs a single cache operation against a Redis server, or listens on a
//! channel until interrupted.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use redis_helpers::{Cache, Config, RedisStore};

/// Command-line arguments. Flags override the environment.
#[derive(Debug, Parser)]
#[command(name = "redis_helpers", version, about = "Prefixed Redis cache operations")]
struct Cli {
    /// Redis connection URL (overrides REDIS_URL)
    #[arg(long)]
    redis_url: Option<String>,

    /// Key prefix (overrides CACHE_PREFIX)
    #[arg(long)]
    prefix: Option<String>,

    /// Default TTL in seconds (overrides REDIS_KEY_EXPIRATION)
    #[arg(long)]
    default_ttl: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a value
    Get { key: String },
    /// Store a value
    Set {
        key: String,
        value: String,
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Rewrite a key with a new TTL, creating it empty if missing
    Expire {
        key: String,
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Update the TTL of an existing key
    Touch {
        key: String,
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Delete keys and, unless --exact, every key below them
    Del {
        #[arg(required = true)]
        keys: Vec<String>,
        #[arg(long)]
        exact: bool,
    },
    /// Check whether a key exists
    Exists { key: String },
    /// Increment a counter
    Incr {
        key: String,
        #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
        by: i64,
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Print seconds until a key expires
    Ttl { key: String },
    /// List keys starting with a prefix
    Keys {
        #[arg(default_value = "")]
        prefix: String,
        #[arg(long)]
        exact: bool,
    },
    /// Delete every key under the configured prefix
    Clear,
    /// Publish a JSON value (plain text is sent as a JSON string)
    Publish { channel: String, value: String },
    /// Print messages from a channel until interrupted
    Subscribe { channel: String },
}

/// Builds the configuration from the environment, then applies flags.
fn load_config(cli: &Cli) -> Config {
    let mut config = Config::from_env();
    if let Some(url) = &cli.redis_url {
        config.redis_url = url.clone();
    }
    if let Some(prefix) = &cli.prefix {
        config = config.with_prefix(prefix.as_str());
    }
    if let Some(ttl) = cli.default_ttl {
        config = config.with_default_ttl(ttl);
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "redis_helpers=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli);
    info!(
        "Configuration loaded: prefix={:?}, default_ttl={}s",
        config.prefix, config.default_ttl
    );

    let store = RedisStore::connect(&config.redis_url)
        .await
        .with_context(|| format!("failed to connect to {}", config.redis_url))?;
    let cache = Cache::new(store, &config);

    run(&cache, cli.command).await
}

async fn run(cache: &Cache<RedisStore>, command: Command) -> Result<()> {
    match command {
        Command::Get { key } => match cache.get(&key).await? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Command::Set { key, value, ttl } => {
            println!("{}", cache.set(&key, value.as_bytes(), ttl).await?);
        }
        Command::Expire { key, ttl } => println!("{}", cache.expire(&key, ttl).await?),
        Command::Touch { key, ttl } => println!("{}", cache.touch(&key, ttl).await?),
        Command::Del { keys, exact } => {
            let deleted = cache.delete(&keys, !exact).await?;
            println!("{}", serde_json::to_string_pretty(&deleted)?);
        }
        Command::Exists { key } => println!("{}", cache.exists(&key).await?),
        Command::Incr { key, by, ttl } => println!("{}", cache.increment(&key, by, ttl).await?),
        Command::Ttl { key } => println!("{}", cache.ttl(&key).await?),
        Command::Keys { prefix, exact } => {
            let keys = cache.keys(&prefix, !exact).await;
            println!("{}", serde_json::to_string_pretty(&keys)?);
        }
        Command::Clear => {
            let deleted = cache.clear().await?;
            println!("{}", serde_json::to_string_pretty(&deleted)?);
        }
        Command::Publish { channel, value } => {
            let value = serde_json::from_str::<serde_json::Value>(&value)
                .unwrap_or(serde_json::Value::String(value));
            cache.publish(&channel, &value).await?;
        }
        Command::Subscribe { channel } => {
            let listen = cache.subscribe(&channel, |message| {
                println!("{} {}", message.channel, message.payload);
            });

            tokio::select! {
                result = listen => result?,
                _ = shutdown_signal() => {}
            }
        }
    }

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, closing subscription...");
        }
        _ = terminate => {
            info!("Received SIGTERM, closing subscription...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_incr_with_negative_delta() {
        let cli = Cli::try_parse_from(["redis_helpers", "incr", "hits", "--by", "-3"]).unwrap();
        match cli.command {
            Command::Incr { key, by, ttl } => {
                assert_eq!(key, "hits");
                assert_eq!(by, -3);
                assert_eq!(ttl, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_del_requires_keys() {
        assert!(Cli::try_parse_from(["redis_helpers", "del"]).is_err());
    }

    #[test]
    fn test_load_config_flags_override() {
        let cli = Cli::try_parse_from([
            "redis_helpers",
            "--prefix",
            "svc",
            "--default-ttl",
            "60",
            "--redis-url",
            "redis://cache:6379",
            "clear",
        ])
        .unwrap();

        let config = load_config(&cli);
        assert_eq!(config.prefix.as_deref(), Some("svc"));
        assert_eq!(config.default_ttl, 60);
        assert_eq!(config.redis_url, "redis://cache:6379");
    }
}
