// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::errors::WorkerError;
use crate::traits::Cache;
use crate::utils::Clock;

struct Entry {
    value: Value,
    expires_at: Option<u64>,
}

/// Process-local cache with lazy TTL expiry.
pub struct MemoryCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn deadline(&self, ttl: Option<Duration>) -> Option<u64> {
        ttl.map(|ttl| self.clock.now_ms() + ttl.as_millis() as u64)
    }

    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str, now: u64) -> Option<&'a mut Entry> {
        if entries
            .get(key)
            .is_some_and(|e| e.expires_at.is_some_and(|at| at <= now))
        {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, WorkerError> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Self::live(&mut entries, key, now).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), WorkerError> {
        let expires_at = self.deadline(ttl);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64, WorkerError> {
        let now = self.clock.now_ms();
        let deadline = self.deadline(ttl);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let current = match Self::live(&mut entries, key, now) {
            Some(entry) => entry
                .value
                .as_i64()
                .ok_or_else(|| WorkerError::Cache(format!("'{}' does not hold an integer", key)))?,
            None => 0,
        };
        let next = current + delta;

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: Value::Null,
            expires_at: None,
        });
        entry.value = Value::from(next);
        if deadline.is_some() {
            entry.expires_at = deadline;
        }
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<bool, WorkerError> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let live = Self::live(&mut entries, key, now).is_some();
        entries.remove(key);
        Ok(live)
    }
}
