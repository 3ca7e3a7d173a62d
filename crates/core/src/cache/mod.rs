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

mod context;
mod facade;
mod factory;
mod memory_store;
pub mod pattern;
pub mod primitives;
mod redis_store;
mod store;

#[cfg(test)]
mod redis_integration_test;

// Public API - callers hold a Cache; stores are exposed for explicit wiring
pub use context::{CancelHandle, OpContext};
pub use facade::{Cache, CacheMetricsSnapshot, LockGuard};
pub use factory::{CacheFactory, SelectorState};
pub use memory_store::MemoryStore;
pub use primitives::{lock_key, LOCK_LEASE, LOCK_SUFFIX};
pub use redis_store::RedisStore;
pub use store::{CacheStore, ScanPage, StoreKind};

#[cfg(test)]
pub(crate) use store::MockCacheStore;
