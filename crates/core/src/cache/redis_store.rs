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

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{FromRedisValue, IntoConnectionInfo};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

use crate::cache::store::{CacheStore, ScanPage, StoreKind};
use crate::cache::OpContext;
use crate::config::RedisConfig;
use crate::types::{CoreError, Result};

/// Redis 缓存存储
///
/// 每次调用都直接转发到 Redis，本地不缓存任何结果。
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
    addr: String,
    command_timeout: Option<Duration>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("addr", &self.addr)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl RedisStore {
    /// 连接 Redis 并通过 PING 验证连接
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(connection_info(config)?).map_err(|e| {
            CoreError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = tokio::time::timeout(
            config.connect_timeout(),
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            CoreError::ConnectionError(format!(
                "Timed out connecting to Redis at {} after {:?}",
                config.addr,
                config.connect_timeout()
            ))
        })?
        .map_err(|e| CoreError::ConnectionError(format!("Failed to connect to Redis: {}", e)))?;

        let store = Self {
            connection,
            addr: config.addr.clone(),
            command_timeout: config.command_timeout(),
        };

        store
            .ping(&OpContext::with_timeout(config.connect_timeout()))
            .await
            .map_err(|e| CoreError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        debug!(
            addr = %config.addr,
            db = config.db,
            "RedisStore connected"
        );

        Ok(store)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn query<T>(&self, ctx: &OpContext, op: &'static str, cmd: redis::Cmd) -> Result<T>
    where
        T: FromRedisValue + Send,
    {
        let mut conn = self.connection.clone();
        ctx.run(self.command_timeout, async move {
            cmd.query_async(&mut conn).await.map_err(|e| {
                error!(op = op, error = %e, "Redis command failed");
                command_error(op, e)
            })
        })
        .await
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, ctx: &OpContext, key: &str) -> Result<Option<String>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let value: Option<String> = self.query(ctx, "GET", cmd).await?;

        if value.is_some() {
            debug!(key = key, "Redis cache hit");
        } else {
            debug!(key = key, "Redis cache miss");
        }
        Ok(value)
    }

    async fn set(&self, ctx: &OpContext, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if !ttl.is_zero() {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let () = self.query(ctx, "SET", cmd).await?;

        debug!(key = key, ttl_ms = ttl.as_millis() as u64, "Redis cache set");
        Ok(())
    }

    async fn del(&self, ctx: &OpContext, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key);
        }
        let deleted: u64 = self.query(ctx, "DEL", cmd).await?;

        debug!(requested = keys.len(), deleted = deleted, "Redis cache delete");
        Ok(deleted)
    }

    async fn scan(
        &self,
        ctx: &OpContext,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<ScanPage> {
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count);
        let (cursor, keys): (u64, Vec<String>) = self.query(ctx, "SCAN", cmd).await?;

        Ok(ScanPage { keys, cursor })
    }

    async fn set_nx(
        &self,
        ctx: &OpContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if !ttl.is_zero() {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let reply: Option<String> = self.query(ctx, "SET NX", cmd).await?;

        Ok(reply.is_some())
    }

    async fn hincr_by(&self, ctx: &OpContext, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut cmd = redis::cmd("HINCRBY");
        cmd.arg(key).arg(field).arg(delta);
        self.query(ctx, "HINCRBY", cmd).await
    }

    async fn hget_all(&self, ctx: &OpContext, key: &str) -> Result<HashMap<String, String>> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(key);
        self.query(ctx, "HGETALL", cmd).await
    }

    async fn expire(&self, ctx: &OpContext, key: &str, ttl: Duration) -> Result<bool> {
        // PEXPIRE with 0 deletes the key, same as the in-process store.
        let millis = if ttl.is_zero() { 0 } else { ttl_millis(ttl) };
        let mut cmd = redis::cmd("PEXPIRE");
        cmd.arg(key).arg(millis);
        self.query(ctx, "PEXPIRE", cmd).await
    }

    async fn ping(&self, ctx: &OpContext) -> Result<()> {
        let pong: String = self.query(ctx, "PING", redis::cmd("PING")).await?;
        if pong != "PONG" {
            return Err(CoreError::CacheError(format!(
                "Unexpected PING response: {}",
                pong
            )));
        }
        Ok(())
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Redis
    }
}

fn connection_info(config: &RedisConfig) -> Result<redis::ConnectionInfo> {
    let url = format!("redis://{}/{}", config.addr, config.db);
    let mut info = url.as_str().into_connection_info().map_err(|e| {
        CoreError::ConnectionError(format!("Invalid Redis address '{}': {}", config.addr, e))
    })?;
    info.redis.password = config.password().map(str::to_string);
    Ok(info)
}

/// Non-zero TTLs shorter than a millisecond round up so they still expire.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn command_error(op: &str, e: redis::RedisError) -> CoreError {
    if e.code() == Some("WRONGTYPE") {
        CoreError::WrongType(e.to_string())
    } else {
        CoreError::CacheError(format!("Redis {} failed: {}", op, e))
    }
}
