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

//! Composite operations built from [`CacheStore`] primitives.
//!
//! These run the same way on every backend. None of them is linearizable as a
//! whole: each step is a separate store command.

use std::time::Duration;
use tracing::debug;

use crate::cache::pattern::prefix_pattern;
use crate::cache::store::CacheStore;
use crate::cache::OpContext;
use crate::types::Result;

/// Lease of a lock token. A holder that never releases blocks others for at
/// most this long.
pub const LOCK_LEASE: Duration = Duration::from_secs(30);

pub const LOCK_SUFFIX: &str = "_lock";

const LOCK_VALUE: &str = "1";

pub fn lock_key(key: &str) -> String {
    format!("{}{}", key, LOCK_SUFFIX)
}

/// Returns the stored value, or stores `value` and returns it when `key` is
/// absent. Two racing callers may both write; the last write wins.
pub async fn get_or_set(
    store: &dyn CacheStore,
    ctx: &OpContext,
    key: &str,
    value: &str,
    ttl: Duration,
) -> Result<String> {
    if let Some(existing) = store.get(ctx, key).await? {
        return Ok(existing);
    }

    store.set(ctx, key, value, ttl).await?;
    Ok(value.to_string())
}

/// Scans for keys starting with `prefix` and deletes them page by page until
/// the cursor wraps to zero. Keys written during the scan may survive.
pub async fn delete_keys_with_prefix(
    store: &dyn CacheStore,
    ctx: &OpContext,
    prefix: &str,
    count: u64,
) -> Result<u64> {
    let pattern = prefix_pattern(prefix);
    let mut cursor = 0;
    let mut deleted = 0;

    loop {
        let page = store.scan(ctx, cursor, &pattern, count).await?;
        if !page.keys.is_empty() {
            deleted += store.del(ctx, &page.keys).await?;
        }

        cursor = page.cursor;
        if cursor == 0 {
            break;
        }
    }

    debug!(prefix = prefix, deleted = deleted, "Deleted keys with prefix");
    Ok(deleted)
}

/// Takes the advisory lock for `key`. No owner is recorded.
pub async fn acquire_lock(store: &dyn CacheStore, ctx: &OpContext, key: &str) -> Result<bool> {
    store
        .set_nx(ctx, &lock_key(key), LOCK_VALUE, LOCK_LEASE)
        .await
}

/// Drops the lock token whoever set it; returns whether one was present.
pub async fn release_lock(store: &dyn CacheStore, ctx: &OpContext, key: &str) -> Result<bool> {
    let deleted = store.del(ctx, &[lock_key(key)]).await?;
    Ok(deleted > 0)
}
