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

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

use crate::types::{CoreError, Result};

/// Per-call deadline and cancellation signal.
///
/// Networked stores race every command against both; the in-process store
/// ignores the context because its critical sections never block.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    timeout: Option<Duration>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

/// Sender half of a cancellable [`OpContext`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl OpContext {
    /// A context with no deadline that can never be cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel_rx: None,
        }
    }

    pub fn cancellable() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx },
            Self {
                timeout: None,
                cancel_rx: Some(rx),
            },
        )
    }

    /// Returns a copy of this context with its deadline replaced.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Drives `fut` until it finishes, the deadline passes or the context is
    /// cancelled. `fallback_timeout` applies only when the context has no
    /// deadline of its own.
    pub async fn run<F, T>(&self, fallback_timeout: Option<Duration>, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let limit = self.timeout.or(fallback_timeout);
        let bounded = async move {
            match limit {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .map_err(|_| CoreError::TimeoutError)?,
                None => fut.await,
            }
        };

        match self.cancel_rx.clone() {
            Some(rx) => {
                tokio::select! {
                    res = bounded => res,
                    _ = wait_cancelled(rx) => Err(CoreError::Cancelled),
                }
            }
            None => bounded.await,
        }
    }
}

async fn wait_cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without cancelling: never fires.
            std::future::pending::<()>().await;
        }
    }
}
