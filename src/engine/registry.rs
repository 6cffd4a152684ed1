// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use crate::backends::{JsonCodec, MemoryCache, TracingLogger, YamlCodec};
use crate::config::consts::{DEFAULT_CACHE, DEFAULT_LOGGER};
use crate::engine::Worker;
use crate::errors::WorkerError;
use crate::traits::{Cache, Codec, Logger};
use crate::utils::{Clock, SystemClock};

/// Directory of live workers and named collaborators.
///
/// Passed explicitly to whatever builds a pipeline; workers resolve their
/// cache, codec and logger through it by name on each use.
#[derive(Default)]
pub struct Registry {
    workers: Mutex<HashMap<String, Weak<Worker>>>,
    caches: RwLock<HashMap<String, Arc<dyn Cache>>>,
    codecs: RwLock<HashMap<String, Arc<dyn Codec>>>,
    loggers: RwLock<HashMap<String, Arc<dyn Logger>>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registry with the in-memory cache, JSON and YAML codecs and the
    /// tracing logger registered under their default names.
    pub fn with_defaults() -> Arc<Self> {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Like [`Registry::with_defaults`], with the memory cache on `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Arc<Self> {
        let registry = Self::new();
        registry.register_cache(DEFAULT_CACHE, Arc::new(MemoryCache::new(clock)));
        registry.register_codec(Arc::new(JsonCodec));
        registry.register_codec(Arc::new(YamlCodec));
        registry.register_logger(DEFAULT_LOGGER, Arc::new(TracingLogger::default()));
        registry
    }

    pub(crate) fn register_worker(&self, worker: &Arc<Worker>) -> Result<(), WorkerError> {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if workers.get(worker.id()).is_some_and(|w| w.strong_count() > 0) {
            return Err(WorkerError::DuplicateWorker {
                id: worker.id().to_string(),
            });
        }
        workers.insert(worker.id().to_string(), Arc::downgrade(worker));
        Ok(())
    }

    pub fn worker(&self, id: &str) -> Option<Arc<Worker>> {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .and_then(Weak::upgrade)
    }

    /// Ids of the live workers, sorted.
    pub fn worker_ids(&self) -> Vec<String> {
        let workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = workers
            .iter()
            .filter(|(_, w)| w.strong_count() > 0)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn register_cache(&self, name: impl Into<String>, cache: Arc<dyn Cache>) {
        self.caches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), cache);
    }

    /// Registered under its own content type.
    pub fn register_codec(&self, codec: Arc<dyn Codec>) {
        self.codecs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(codec.content_type().to_string(), codec);
    }

    pub fn register_logger(&self, name: impl Into<String>, logger: Arc<dyn Logger>) {
        self.loggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), logger);
    }

    pub fn cache(&self, name: &str) -> Result<Arc<dyn Cache>, WorkerError> {
        lookup(&self.caches, "cache", name)
    }

    pub fn codec(&self, content_type: &str) -> Result<Arc<dyn Codec>, WorkerError> {
        lookup(&self.codecs, "codec", content_type)
    }

    pub fn logger(&self, name: &str) -> Result<Arc<dyn Logger>, WorkerError> {
        lookup(&self.loggers, "logger", name)
    }
}

fn lookup<T: ?Sized>(
    table: &RwLock<HashMap<String, Arc<T>>>,
    what: &str,
    name: &str,
) -> Result<Arc<T>, WorkerError> {
    table
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
        .ok_or_else(|| WorkerError::NotFound(format!("no {} registered as '{}'", what, name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::consts::{CONTENT_TYPE_JSON, CONTENT_TYPE_YAML};

    #[test]
    fn defaults_are_registered() {
        let registry = Registry::with_defaults();
        assert!(registry.cache(DEFAULT_CACHE).is_ok());
        assert!(registry.codec(CONTENT_TYPE_JSON).is_ok());
        assert!(registry.codec(CONTENT_TYPE_YAML).is_ok());
        assert!(registry.logger(DEFAULT_LOGGER).is_ok());
    }

    #[test]
    fn empty_registry_reports_not_found() {
        let registry = Registry::new();
        let error = registry.codec("text/csv").err().unwrap();
        assert_eq!(error, WorkerError::NotFound("no codec registered as 'text/csv'".into()));
    }

    #[test]
    fn worker_directory_tracks_live_workers() {
        let registry = Registry::with_defaults();
        let a = Worker::builder("a").build(&registry).unwrap();
        let b = Worker::builder("b").build(&registry).unwrap();
        assert_eq!(registry.worker_ids(), vec!["a", "b"]);
        assert_eq!(registry.worker("a").map(|w| w.id().to_string()), Some("a".into()));

        drop(b);
        assert_eq!(registry.worker_ids(), vec!["a"]);
        assert!(registry.worker("b").is_none());
        drop(a);
    }
}
