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

//! Session signing secret shared through the cache.

use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{Cache, OpContext};
use crate::types::Result;

pub const SESSION_KEY: &str = "SessionKey";

/// Where the resolved secret is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretScope {
    /// Stored in Redis; every replica resolves the same value.
    ClusterShared,
    /// Stored in this process only.
    ProcessLocal,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret {
    value: String,
    scope: SecretScope,
}

impl std::fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSecret")
            .field("value", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

impl SessionSecret {
    pub fn scope(&self) -> SecretScope {
        self.scope
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }

    pub fn expose(&self) -> &str {
        &self.value
    }
}

/// Returns the cluster-wide session secret, creating it on first use.
///
/// The first writer wins: later callers read the stored value instead of
/// their own candidate. Under the in-process fallback every replica ends up
/// with its own secret.
pub async fn resolve_session_secret(cache: &Cache, ctx: &OpContext) -> Result<SessionSecret> {
    let candidate = Uuid::new_v4().to_string();
    let value = cache
        .get_or_set(ctx, SESSION_KEY, candidate, Duration::ZERO)
        .await?;

    let scope = if cache.kind().is_shared() {
        SecretScope::ClusterShared
    } else {
        SecretScope::ProcessLocal
    };

    match scope {
        SecretScope::ClusterShared => info!("Session secret resolved from shared cache"),
        SecretScope::ProcessLocal => warn!(
            "Session secret is process-local; sessions signed by this instance \
             will not validate on other replicas"
        ),
    }

    Ok(SessionSecret { value, scope })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MockCacheStore, StoreKind};
    use crate::types::CoreError;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_secret_is_stable_per_cache() {
        let cache = Cache::in_memory();
        let ctx = OpContext::background();

        let first = resolve_session_secret(&cache, &ctx).await.unwrap();
        let second = resolve_session_secret(&cache, &ctx).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.scope(), SecretScope::ProcessLocal);
        assert!(Uuid::parse_str(first.expose()).is_ok());
    }

    #[tokio::test]
    async fn test_existing_secret_is_reused() {
        let cache = Cache::in_memory();
        let ctx = OpContext::background();
        cache
            .set(&ctx, SESSION_KEY, "preexisting", Duration::ZERO)
            .await
            .unwrap();

        let secret = resolve_session_secret(&cache, &ctx).await.unwrap();
        assert_eq!(secret.as_bytes(), b"preexisting");
    }

    #[tokio::test]
    async fn test_separate_fallback_caches_diverge() {
        let ctx = OpContext::background();
        let a = resolve_session_secret(&Cache::in_memory(), &ctx).await.unwrap();
        let b = resolve_session_secret(&Cache::in_memory(), &ctx).await.unwrap();
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = SessionSecret {
            value: "hunter2".to_string(),
            scope: SecretScope::ClusterShared,
        };
        let printed = format!("{:?}", secret);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("redacted"));
    }

    #[tokio::test]
    async fn test_shared_store_reports_cluster_scope() {
        let mut store = MockCacheStore::new();
        store.expect_get().times(1).returning(|_, _| Ok(None));
        store
            .expect_set()
            .withf(|_, key, _, ttl| key == SESSION_KEY && ttl.is_zero())
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        store.expect_kind().return_const(StoreKind::Redis);

        let cache = Cache::new(Arc::new(store));
        let secret = resolve_session_secret(&cache, &OpContext::background())
            .await
            .unwrap();
        assert_eq!(secret.scope(), SecretScope::ClusterShared);
    }

    #[tokio::test]
    async fn test_cache_error_propagates() {
        let mut store = MockCacheStore::new();
        store
            .expect_get()
            .returning(|_, _| Err(CoreError::CacheError("down".to_string())));
        let cache = Cache::new(Arc::new(store));

        let result = resolve_session_secret(&cache, &OpContext::background()).await;
        assert!(result.is_err());
    }
}
