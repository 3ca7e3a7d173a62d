// Copyright © 2026 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Operator tool for inspecting and poking the wiki cache.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wikicache_core::{
    resolve_session_secret, Cache, CacheFactory, Config, LoggingConfig, OpContext, SecretScope,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Parser, Debug)]
#[command(name = "wikicache")]
#[command(about = "Inspect and operate the wiki cache")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path (default: ./config.toml, then environment)
    #[arg(short, long)]
    config: Option<String>,

    /// Per-command timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Report which backend the factory selects
    Probe,
    /// Read a value
    Get { key: String },
    /// Write a value
    Set {
        key: String,
        value: String,
        /// Lifetime in seconds, 0 keeps the value forever
        #[arg(long, default_value = "0")]
        ttl: u64,
    },
    /// Delete one or more keys
    Del {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Delete every key starting with a prefix
    EvictPrefix { prefix: String },
    /// Take the advisory lock for a key
    Lock { key: String },
    /// Drop the advisory lock for a key
    Unlock { key: String },
    /// Increment a hash field
    Hincr {
        key: String,
        field: String,
        #[arg(default_value = "1", allow_negative_numbers = true)]
        delta: i64,
    },
    /// Print every field of a hash
    Hgetall { key: String },
    /// Set a key's lifetime in seconds, 0 deletes it
    Expire { key: String, seconds: u64 },
    /// Resolve the session secret and print its fingerprint
    SessionSecret,
}

/// Explicit path, else `default_path` when it exists, else environment only.
fn load_config(path: Option<&str>, default_path: &str) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None if Path::new(default_path).exists() => default_path,
        None => return Config::load_from_env().context("Invalid environment configuration"),
    };

    let mut config = Config::load_from_file(path)
        .with_context(|| format!("Failed to load config from {}", path))?;
    config
        .apply_env()
        .context("Invalid environment configuration")?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn fingerprint(secret: &[u8]) -> String {
    hex::encode(Sha256::digest(secret))
}

fn scope_label(scope: SecretScope) -> &'static str {
    match scope {
        SecretScope::ClusterShared => "cluster-shared",
        SecretScope::ProcessLocal => "process-local",
    }
}

async fn run(command: Commands, cache: &Cache, ctx: &OpContext) -> Result<()> {
    match command {
        Commands::Probe => {
            cache.ping(ctx).await?;
            println!(
                "{}",
                serde_json::json!({
                    "backend": cache.kind().to_string(),
                    "shared": cache.kind().is_shared(),
                })
            );
        }
        Commands::Get { key } => match cache.get(ctx, &key).await? {
            Some(value) => println!("{}", value),
            None => println!("(nil)"),
        },
        Commands::Set { key, value, ttl } => {
            cache
                .set(ctx, &key, value, Duration::from_secs(ttl))
                .await?;
            println!("OK");
        }
        Commands::Del { keys } => {
            println!("{}", cache.del(ctx, keys.as_slice()).await?);
        }
        Commands::EvictPrefix { prefix } => {
            let deleted = cache.delete_keys_with_prefix(ctx, &prefix).await?;
            println!("{}", deleted);
        }
        Commands::Lock { key } => {
            println!("{}", cache.acquire_lock(ctx, &key).await?);
        }
        Commands::Unlock { key } => {
            println!("{}", cache.release_lock(ctx, &key).await?);
        }
        Commands::Hincr { key, field, delta } => {
            println!("{}", cache.hincr_by(ctx, &key, &field, delta).await?);
        }
        Commands::Hgetall { key } => {
            let fields = cache.hget_all(ctx, &key).await?;
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
        Commands::Expire { key, seconds } => {
            let applied = cache
                .expire(ctx, &key, Duration::from_secs(seconds))
                .await?;
            println!("{}", applied);
        }
        Commands::SessionSecret => {
            let secret = resolve_session_secret(cache, ctx).await?;
            println!(
                "{}",
                serde_json::json!({
                    "scope": scope_label(secret.scope()),
                    "sha256": fingerprint(secret.as_bytes()),
                })
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), DEFAULT_CONFIG_PATH)?;
    init_tracing(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting wikicache");

    let mut factory = CacheFactory::new(&config);
    let cache = factory.build().await;
    info!(backend = %cache.kind(), state = ?factory.state(), "Cache ready");

    let ctx = match cli.timeout_ms {
        Some(ms) => OpContext::with_timeout(Duration::from_millis(ms)),
        None => OpContext::background(),
    };

    run(cli.command, &cache, &ctx).await
}
