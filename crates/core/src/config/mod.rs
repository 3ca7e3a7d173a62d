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

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {}", _0)]
    MissingRequired(String),

    #[error("Invalid configuration value: {}", _0)]
    InvalidValue(String),

    #[error("Configuration file error: {}", _0)]
    FileError(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Redis 连接配置
///
/// Only `addr` and `password` matter for backend selection. They are not
/// checked here; the startup probe decides whether they are usable.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RedisConfig {
    pub addr: String,
    pub password: String,
    pub db: i64,
    pub connect_timeout_ms: u64,
    /// Applied to each command when the caller's context carries no deadline.
    /// Zero disables the default.
    pub command_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: "localhost:6379".to_string(),
            password: String::new(),
            db: 0,
            connect_timeout_ms: 2000,
            command_timeout_ms: 5000,
        }
    }
}

impl RedisConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_ms > 0).then(|| Duration::from_millis(self.command_timeout_ms))
    }

    pub fn password(&self) -> Option<&str> {
        (!self.password.is_empty()).then_some(self.password.as_str())
    }
}

/// Which store the factory should try first.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Probe Redis, fall back to the in-process store if it is unreachable.
    #[default]
    Redis,
    /// Skip the probe and use the in-process store.
    Memory,
}

impl std::str::FromStr for BackendPreference {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(BackendPreference::Redis),
            "memory" | "in-memory" => Ok(BackendPreference::Memory),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown cache backend '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: BackendPreference,
    /// COUNT hint passed to SCAN by prefix eviction.
    pub scan_count: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Redis,
            scan_count: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
            include_location: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub redis: RedisConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load_from_file(path: &str) -> ConfigResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileError(e.to_string()))?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    pub fn load_from_env() -> ConfigResult<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay environment variables on top of the current values.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("REDIS_ADDR") {
            if addr.trim().is_empty() {
                return Err(ConfigError::MissingRequired("REDIS_ADDR".to_string()));
            }
            self.redis.addr = addr;
        }
        if let Some(password) = lookup("REDIS_PASSWORD") {
            self.redis.password = password;
        }
        if let Some(db) = lookup("REDIS_DB") {
            self.redis.db = db
                .parse()
                .map_err(|_| ConfigError::InvalidValue("REDIS_DB".to_string()))?;
        }
        if let Some(backend) = lookup("CACHE_BACKEND") {
            self.cache.backend = backend.parse()?;
        }
        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.redis.addr, "localhost:6379");
        assert_eq!(config.redis.password(), None);
        assert_eq!(config.redis.command_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.cache.backend, BackendPreference::Redis);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [redis]
            addr = "cache.internal:6380"
            password = "s3cret"

            [cache]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.redis.addr, "cache.internal:6380");
        assert_eq!(config.redis.password(), Some("s3cret"));
        assert_eq!(config.redis.connect_timeout_ms, 2000);
        assert_eq!(config.cache.backend, BackendPreference::Memory);
        assert_eq!(config.cache.scan_count, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml_str("[redis\naddr = 1");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wikicache.toml");
        std::fs::write(&path, "[redis]\ndb = 3\n").unwrap();

        let config = Config::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.redis.db, 3);

        let missing = Config::load_from_file(dir.path().join("nope.toml").to_str().unwrap());
        assert!(matches!(missing, Err(ConfigError::FileError(_))));
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("REDIS_ADDR", "10.0.0.5:6379"),
            ("REDIS_PASSWORD", "pw"),
            ("REDIS_DB", "2"),
            ("CACHE_BACKEND", "Memory"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_vars(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.redis.addr, "10.0.0.5:6379");
        assert_eq!(config.redis.password(), Some("pw"));
        assert_eq!(config.redis.db, 2);
        assert_eq!(config.cache.backend, BackendPreference::Memory);
    }

    #[test]
    fn test_env_overlay_rejects_bad_values() {
        let mut config = Config::default();
        let result = config.apply_vars(|name| (name == "REDIS_DB").then(|| "x".to_string()));
        assert_eq!(
            result,
            Err(ConfigError::InvalidValue("REDIS_DB".to_string()))
        );

        let result =
            config.apply_vars(|name| (name == "CACHE_BACKEND").then(|| "memcached".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));

        let result = config.apply_vars(|name| (name == "REDIS_ADDR").then(|| " ".to_string()));
        assert_eq!(
            result,
            Err(ConfigError::MissingRequired("REDIS_ADDR".to_string()))
        );
    }

    #[test]
    fn test_zero_command_timeout_disables_default() {
        let redis = RedisConfig {
            command_timeout_ms: 0,
            ..RedisConfig::default()
        };
        assert_eq!(redis.command_timeout(), None);
    }
}
