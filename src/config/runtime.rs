// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::backends::{MemoryBroker, TracingLogger};
use crate::config::consts::{DEFAULT_CACHE, DEFAULT_LOGGER};
use crate::config::{BackendKind, Config, WorkerConfig, WorkerKind};
use crate::engine::{
    Broadcaster, BoxRef, Outcome, Payload, Queuer, Registry, ResolverLogic, SlicerLogic, TaskBox, Worker,
};
use crate::errors::{ConfigError, WorkerError};
use crate::traits::Broker;

/// Registry name of the Redis-backed cache.
const REDIS_CACHE: &str = "redis";
/// Id of the worker collecting pipeline completions.
const COMPLETIONS: &str = "relay.completions";

/// Pipeline runtime builder - turns a validated configuration into wired workers.
///
/// The `RuntimeBuilder` creates the broker and cache named by the config,
/// registers collaborators, builds every worker by kind and then wires the
/// links in a second pass, so links may point forward in the file.
///
/// # Examples
///
/// ```
/// use the_relay::config::{Config, RuntimeBuilder};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let config: Config = serde_yaml::from_str(r#"
/// entry: a
/// workers:
///   - id: a
///     downstream: b
///   - id: b
/// "#).unwrap();
///
/// let pipeline = RuntimeBuilder::from_config(&config).await.unwrap();
/// assert_eq!(pipeline.entry().unwrap().id(), "a");
/// assert_eq!(pipeline.worker("a").unwrap().downstream().unwrap().id(), "b");
/// # });
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build a complete pipeline from configuration.
    ///
    /// Connects to Redis when the broker or cache asks for it; that requires
    /// the `redis` feature.
    pub async fn from_config(cfg: &Config) -> Result<Pipeline, ConfigError> {
        let registry = Registry::with_defaults();

        let broker: Arc<dyn Broker> = match cfg.broker.kind {
            BackendKind::Memory => Arc::new(MemoryBroker::default()),
            BackendKind::Redis => redis_broker(cfg.broker.url.as_deref()).await?,
        };

        if cfg.cache.kind == BackendKind::Redis {
            register_redis_cache(&registry, cfg.cache.url.as_deref()).await?;
        }

        Self::from_parts(cfg, registry, broker)
    }

    /// Build a pipeline over an existing registry and broker.
    ///
    /// # Arguments
    /// * `cfg` - Configuration containing worker definitions and links
    /// * `registry` - Collaborator registry the workers are registered in
    /// * `broker` - Broker shared by every Queuer of the pipeline
    pub fn from_parts(
        cfg: &Config,
        registry: Arc<Registry>,
        broker: Arc<dyn Broker>,
    ) -> Result<Pipeline, ConfigError> {
        if !cfg.logging.routes.is_empty() {
            registry.register_logger(DEFAULT_LOGGER, Arc::new(TracingLogger::with_routes(&cfg.logging.routes)));
        }

        let default_cache = match cfg.cache.kind {
            BackendKind::Memory => DEFAULT_CACHE,
            BackendKind::Redis => REDIS_CACHE,
        };

        let mut workers = HashMap::new();
        let mut broadcasters = HashMap::new();
        let mut queuers = HashMap::new();

        for wc in &cfg.workers {
            let builder = builder_for(wc, default_cache);
            let worker = match wc.kind {
                WorkerKind::Worker => builder.build(&registry),
                WorkerKind::Slicer => builder.logic(SlicerLogic::new()).build(&registry),
                WorkerKind::Resolver => builder.logic(ResolverLogic::new(wc.collect)).build(&registry),
                WorkerKind::Broadcaster => Broadcaster::build(builder, wc.resolve, &registry).map(|b| {
                    let worker = b.worker().clone();
                    broadcasters.insert(wc.id.clone(), b);
                    worker
                }),
                WorkerKind::Queuer => {
                    let options = wc.queuer.clone().unwrap_or_default();
                    Queuer::build(builder, options, broker.clone(), &registry).map(|q| {
                        let worker = q.worker().clone();
                        queuers.insert(wc.id.clone(), q);
                        worker
                    })
                }
            }
            .map_err(|source| build_error(&wc.id, source))?;
            workers.insert(wc.id.clone(), worker);
        }

        let lookup = |wc: &WorkerConfig, target: &str| -> Result<Arc<Worker>, ConfigError> {
            workers.get(target).cloned().ok_or_else(|| {
                build_error(&wc.id, WorkerError::NotFound(format!("no worker '{}' to link to", target)))
            })
        };

        for wc in &cfg.workers {
            let worker = lookup(wc, &wc.id)?;
            if let Some(target) = &wc.downstream {
                worker.connect(lookup(wc, target)?);
            }
            if let Some(target) = &wc.bypass {
                worker.set_bypass(Some(lookup(wc, target)?));
            }
            if let Some(broadcaster) = broadcasters.get(&wc.id) {
                for target in &wc.branches {
                    broadcaster.attach(lookup(wc, target)?);
                }
            }
            if let (Some(queuer), Some(target)) = (queuers.get(&wc.id), &wc.outlet) {
                queuer.set_outlet(Some(lookup(wc, target)?));
            }
        }

        let entry = match &cfg.entry {
            Some(id) => Some(workers.get(id).cloned().ok_or_else(|| {
                build_error(id, WorkerError::NotFound(format!("entry worker '{}' is not configured", id)))
            })?),
            None => None,
        };

        Ok(Pipeline {
            registry,
            broker,
            workers,
            branching: broadcasters
                .into_keys()
                .filter(|id| cfg.worker(id).is_some_and(|wc| !wc.branches.is_empty()))
                .collect(),
            queuers,
            entry,
        })
    }
}

fn builder_for(wc: &WorkerConfig, default_cache: &str) -> crate::engine::WorkerBuilder {
    let mut builder = Worker::builder(&wc.id)
        .name(wc.name())
        .cache(wc.cache.as_deref().unwrap_or(default_cache));
    if let Some(description) = &wc.description {
        builder = builder.description(description);
    }
    if let Some(codec) = &wc.codec {
        builder = builder.codec(codec);
    }
    if let Some(logger) = &wc.logger {
        builder = builder.logger(logger);
    }
    builder
}

fn build_error(worker_id: &str, source: WorkerError) -> ConfigError {
    ConfigError::Build {
        worker_id: worker_id.to_string(),
        source,
    }
}

#[cfg(feature = "redis")]
async fn redis_broker(url: Option<&str>) -> Result<Arc<dyn Broker>, ConfigError> {
    let url = redis_url(url)?;
    let broker = crate::backends::RedisBroker::connect(url)
        .await
        .map_err(|e| unavailable(e.to_string()))?;
    Ok(Arc::new(broker))
}

#[cfg(not(feature = "redis"))]
async fn redis_broker(_url: Option<&str>) -> Result<Arc<dyn Broker>, ConfigError> {
    Err(unavailable("built without the 'redis' feature".to_string()))
}

#[cfg(feature = "redis")]
async fn register_redis_cache(registry: &Registry, url: Option<&str>) -> Result<(), ConfigError> {
    let url = redis_url(url)?;
    let cache = crate::backends::RedisCache::connect(url)
        .await
        .map_err(|e| unavailable(e.to_string()))?;
    registry.register_cache(REDIS_CACHE, Arc::new(cache));
    Ok(())
}

#[cfg(not(feature = "redis"))]
async fn register_redis_cache(_registry: &Registry, _url: Option<&str>) -> Result<(), ConfigError> {
    Err(unavailable("built without the 'redis' feature".to_string()))
}

#[cfg(feature = "redis")]
fn redis_url(url: Option<&str>) -> Result<&str, ConfigError> {
    url.ok_or_else(|| unavailable("no url configured".to_string()))
}

fn unavailable(reason: String) -> ConfigError {
    ConfigError::BackendUnavailable {
        backend: "redis".to_string(),
        reason,
    }
}

/// A built pipeline: the wired workers plus the handles needed to drive it.
///
/// Holds the only strong references to workers that nothing links to, so the
/// pipeline must outlive any box flowing through it.
pub struct Pipeline {
    registry: Arc<Registry>,
    broker: Arc<dyn Broker>,
    workers: HashMap<String, Arc<Worker>>,
    branching: Vec<String>,
    queuers: HashMap<String, Queuer>,
    entry: Option<Arc<Worker>>,
}

impl Pipeline {
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    pub fn entry(&self) -> Option<&Arc<Worker>> {
        self.entry.as_ref()
    }

    pub fn worker(&self, id: &str) -> Option<&Arc<Worker>> {
        self.workers.get(id)
    }

    pub fn queuer(&self, id: &str) -> Option<&Queuer> {
        self.queuers.get(id)
    }

    pub fn queuers(&self) -> impl Iterator<Item = &Queuer> {
        self.queuers.values()
    }

    /// Starts every Queuer's listener.
    pub async fn start(&self) -> Result<(), WorkerError> {
        for queuer in self.queuers.values() {
            queuer.start().await?;
        }
        Ok(())
    }

    pub fn stop(&self) {
        for queuer in self.queuers.values() {
            queuer.stop();
        }
    }

    /// Feeds `value` to the entry worker in a fresh box and returns the box
    /// once the synchronous part of the pipeline has run.
    pub async fn call(&self, value: Value) -> Result<BoxRef, WorkerError> {
        let entry = self
            .entry
            .as_ref()
            .ok_or_else(|| WorkerError::NotFound("pipeline has no entry worker".to_string()))?;
        let bx = TaskBox::new();
        entry.call(&bx, Payload::new(value)).await;
        Ok(bx)
    }

    /// Connects every terminal worker to a collector and returns the stream
    /// of what reaches the end of the pipeline on either path.
    ///
    /// A worker is terminal when it has no downstream and is not a
    /// broadcaster with branches. Can be called once per pipeline.
    pub fn completions(&self) -> Result<mpsc::UnboundedReceiver<Outcome>, WorkerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let on_err = tx.clone();
        let sink = Worker::builder(COMPLETIONS)
            .decide_constant(true)
            .on_act(move |_, _, data| {
                let _ = tx.send(Ok(data));
                async { Ok::<(), WorkerError>(()) }
            })
            .on_err(move |_, _, error| {
                let _ = on_err.send(Err(error));
                async { Ok::<(), WorkerError>(()) }
            })
            .build(&self.registry)?;

        for (id, worker) in &self.workers {
            if worker.downstream().is_none() && !self.branching.contains(id) {
                worker.connect(&sink);
            }
        }
        Ok(rx)
    }
}
