// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::errors::WorkerError;

/// Key-value store with optional per-entry TTL.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, WorkerError>;

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), WorkerError>;

    /// Adds `delta` to an integer entry (missing counts as 0) and returns the
    /// new value. `ttl` is applied when given.
    async fn increment(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64, WorkerError>;

    /// Returns whether an entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, WorkerError>;

    /// Whether every cooperating process sees the same entries. Cross-process
    /// bookkeeping such as result finalization is only correct on a shared cache.
    fn is_shared(&self) -> bool {
        false
    }
}
