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

//! Runs against a live Redis at `REDIS_ADDR` (default `localhost:6379`).
//! Every test returns early with a warning when no server answers.

use crate::cache::{Cache, OpContext, RedisStore, StoreKind};
use crate::config::RedisConfig;
use crate::types::CoreError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::warn;

const KEY_PREFIX: &str = "wikicache:test:";

async fn get_test_cache() -> Option<Cache> {
    let config = RedisConfig {
        addr: std::env::var("REDIS_ADDR").unwrap_or_else(|_| "localhost:6379".to_string()),
        password: std::env::var("REDIS_PASSWORD").unwrap_or_default(),
        connect_timeout_ms: 500,
        ..RedisConfig::default()
    };

    match RedisStore::connect(&config).await {
        Ok(store) => Some(Cache::new(Arc::new(store))),
        Err(e) => {
            warn!("Skipping Redis test (not available): {}", e);
            None
        }
    }
}

/// Keys are unique per test run so parallel runs never collide.
fn test_key(name: &str) -> String {
    format!("{}{}:{}", KEY_PREFIX, uuid::Uuid::new_v4().simple(), name)
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    fn ctx() -> OpContext {
        OpContext::background()
    }

    #[tokio::test]
    async fn test_redis_integration_get_set_del() {
        let Some(cache) = get_test_cache().await else {
            return;
        };
        assert_eq!(cache.kind(), StoreKind::Redis);
        cache.ping(&ctx()).await.unwrap();

        let key = test_key("get_set");
        assert_eq!(cache.get(&ctx(), &key).await.unwrap(), None);

        cache.set(&ctx(), &key, "v", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get(&ctx(), &key).await.unwrap(), Some("v".to_string()));

        assert_eq!(cache.del(&ctx(), &[&key]).await.unwrap(), 1);
        assert_eq!(cache.del(&ctx(), &[&key]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_redis_integration_ttl() {
        let Some(cache) = get_test_cache().await else {
            return;
        };
        let key = test_key("ttl");

        cache
            .set(&ctx(), &key, "short", Duration::from_millis(200))
            .await
            .unwrap();
        assert!(cache.get(&ctx(), &key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(cache.get(&ctx(), &key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_redis_integration_set_nx_and_get_or_set() {
        let Some(cache) = get_test_cache().await else {
            return;
        };
        let key = test_key("nx");

        assert!(cache.set_nx(&ctx(), &key, "first", Duration::ZERO).await.unwrap());
        assert!(!cache.set_nx(&ctx(), &key, "second", Duration::ZERO).await.unwrap());
        assert_eq!(
            cache.get_or_set(&ctx(), &key, "third", Duration::ZERO).await.unwrap(),
            "first"
        );

        cache.del(&ctx(), &[&key]).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_integration_delete_keys_with_prefix() {
        let Some(cache) = get_test_cache().await else {
            return;
        };
        let ns = test_key("ns:");
        let other = test_key("other:c");

        for i in 0..25 {
            let key = format!("{}{}", ns, i);
            cache.set(&ctx(), &key, i, Duration::ZERO).await.unwrap();
        }
        cache.set(&ctx(), &other, "keep", Duration::ZERO).await.unwrap();

        let cache = cache.with_scan_count(5);
        assert_eq!(cache.delete_keys_with_prefix(&ctx(), &ns).await.unwrap(), 25);
        assert_eq!(
            cache.get(&ctx(), &format!("{}0", ns)).await.unwrap(),
            None
        );
        assert_eq!(
            cache.get(&ctx(), &other).await.unwrap(),
            Some("keep".to_string())
        );

        cache.del(&ctx(), &[&other]).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_integration_hash_counters() {
        let Some(cache) = get_test_cache().await else {
            return;
        };
        let key = test_key("counter");

        for expected in 1..=3 {
            assert_eq!(cache.hincr_by(&ctx(), &key, "views", 1).await.unwrap(), expected);
        }
        let all = cache.hget_all(&ctx(), &key).await.unwrap();
        assert_eq!(all, HashMap::from([("views".to_string(), "3".to_string())]));

        assert!(cache.expire(&ctx(), &key, Duration::from_secs(60)).await.unwrap());
        assert!(cache.expire(&ctx(), &key, Duration::ZERO).await.unwrap());
        assert!(cache.hget_all(&ctx(), &key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redis_integration_wrong_type() {
        let Some(cache) = get_test_cache().await else {
            return;
        };
        let key = test_key("scalar");

        cache.set(&ctx(), &key, "text", Duration::ZERO).await.unwrap();
        let result = cache.hincr_by(&ctx(), &key, "f", 1).await;
        assert!(matches!(result, Err(CoreError::WrongType(_))));

        cache.del(&ctx(), &[&key]).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_redis_integration_concurrent_locks() {
        let Some(cache) = get_test_cache().await else {
            return;
        };
        let key = test_key("job");

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                let key = key.clone();
                task::spawn(async move { cache.acquire_lock(&OpContext::background(), &key).await })
            })
            .collect();

        let winners = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|t| t.unwrap().unwrap())
            .filter(|acquired| *acquired)
            .count();
        assert_eq!(winners, 1, "Exactly one task should hold the lock");

        assert!(cache.release_lock(&ctx(), &key).await.unwrap());
        assert!(cache.acquire_lock(&ctx(), &key).await.unwrap());
        assert!(cache.release_lock(&ctx(), &key).await.unwrap());
    }

    #[tokio::test]
    async fn test_redis_integration_cancelled_context() {
        let Some(cache) = get_test_cache().await else {
            return;
        };
        let (handle, cancelled) = OpContext::cancellable();
        handle.cancel();

        let result = cache.get(&cancelled, &test_key("cancel")).await;
        assert_eq!(result, Err(CoreError::Cancelled));
    }
}
