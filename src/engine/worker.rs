// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The pipeline node.
//!
//! A [`Worker`] has one way forward at any moment: `act` fires when `decide`
//! says so, otherwise the input goes to `bypass` if wired, else `downstream`,
//! else it is absorbed. Errors take the parallel `err` path with the same
//! shape. Node types (Slicer, Broadcaster, Resolver, Queuer) plug in through
//! [`WorkerLogic`]; individual instances are customised through [`Hooks`].
//!
//! The hop methods return boxed futures because a pipeline is a recursive
//! call chain: `call_act -> act -> pass -> downstream.call_act -> ...`.

use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::backends::logger::emit;
use crate::config::consts::{CONTENT_TYPE_JSON, DEFAULT_CACHE, DEFAULT_LOGGER};
use crate::engine::hooks::{ActFn, DecideFn, ErrFn, FilterFn, Hook, Hooks, MergeFn};
use crate::engine::{BoxRef, Payload, Registry, TaskBox};
use crate::errors::WorkerError;
use crate::observability::messages::worker::{
    DataPassed, ErrorDropped, ErrorForwarded, HandlerFailed, InputAbsorbed,
};
use crate::traits::{Cache, Codec, LogLevel, Logger, Stage, WorkerLogic};

/// Logic of a plain worker: every default of [`WorkerLogic`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl WorkerLogic for PassThrough {
    fn kind(&self) -> &'static str {
        "worker"
    }
}

/// A connectable piece of pipeline: where input enters and where the
/// convergent exit is, so branches can be chained as one unit.
#[derive(Clone)]
pub struct Segment {
    pub entry: Arc<Worker>,
    pub exit: Arc<Worker>,
}

impl From<Arc<Worker>> for Segment {
    fn from(worker: Arc<Worker>) -> Self {
        Segment {
            entry: worker.clone(),
            exit: worker,
        }
    }
}

impl From<&Arc<Worker>> for Segment {
    fn from(worker: &Arc<Worker>) -> Self {
        Segment::from(worker.clone())
    }
}

impl From<(Arc<Worker>, Arc<Worker>)> for Segment {
    fn from((entry, exit): (Arc<Worker>, Arc<Worker>)) -> Self {
        Segment { entry, exit }
    }
}

pub struct Worker {
    id: String,
    name: String,
    description: Option<String>,
    logic: Arc<dyn WorkerLogic>,
    hooks: Hooks,
    upstream: RwLock<Weak<Worker>>,
    downstream: RwLock<Option<Arc<Worker>>>,
    bypass: RwLock<Option<Arc<Worker>>>,
    registry: Arc<Registry>,
    cache: String,
    codec: String,
    logger: String,
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(PoisonError::into_inner) = value;
}

impl Worker {
    pub fn builder(id: impl Into<String>) -> WorkerBuilder {
        WorkerBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Logical role, shared by cooperating instances. Barriers are keyed by it.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn kind(&self) -> &'static str {
        self.logic.kind()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    // Topology

    pub fn upstream(&self) -> Option<Arc<Worker>> {
        read(&self.upstream).upgrade()
    }

    pub fn downstream(&self) -> Option<Arc<Worker>> {
        read(&self.downstream)
    }

    pub fn bypass(&self) -> Option<Arc<Worker>> {
        read(&self.bypass)
    }

    pub(crate) fn set_upstream(&self, upstream: &Arc<Worker>) {
        write(&self.upstream, Arc::downgrade(upstream));
    }

    /// Wires `next` as the alternate hop taken when `decide` is false.
    pub fn set_bypass(self: &Arc<Self>, next: Option<Arc<Worker>>) {
        if let Some(next) = &next {
            next.set_upstream(self);
        }
        write(&self.bypass, next);
    }

    /// Makes `next` this worker's downstream and returns the exit of `next`,
    /// so chains read left to right: `a.connect(&b).connect(&c)`.
    pub fn connect(self: &Arc<Self>, next: impl Into<Segment>) -> Arc<Worker> {
        let segment = next.into();
        segment.entry.set_upstream(self);
        write(&self.downstream, Some(segment.entry));
        segment.exit
    }

    // Hop entry points

    /// Pipeline entry.
    pub fn call<'a>(self: &'a Arc<Self>, bx: &'a BoxRef, data: Payload) -> BoxFuture<'a, ()> {
        self.call_act(bx, data)
    }

    pub fn call_act<'a>(self: &'a Arc<Self>, bx: &'a BoxRef, data: Payload) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if self.decide(bx, Stage::Act(&data)) {
                let data = self.filter(bx, data);
                if let Err(error) = self.act(bx, data).await {
                    self.log(
                        LogLevel::Error,
                        &HandlerFailed {
                            worker_id: &self.id,
                            stage: "act",
                            error: &error,
                        },
                        bx,
                    );
                    self.call_err(bx, error).await;
                }
            } else if let Some(next) = self.bypass().or_else(|| self.downstream()) {
                next.call_act(bx, data).await;
            } else {
                self.log(LogLevel::Debug, &InputAbsorbed { worker_id: &self.id }, bx);
            }
        })
    }

    pub fn call_err<'a>(self: &'a Arc<Self>, bx: &'a BoxRef, error: WorkerError) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if self.decide(bx, Stage::Err(&error)) {
                if let Err(error) = self.err(bx, error).await {
                    self.log(
                        LogLevel::Error,
                        &HandlerFailed {
                            worker_id: &self.id,
                            stage: "err",
                            error: &error,
                        },
                        bx,
                    );
                    self.fail(bx, error).await;
                }
            } else if let Some(next) = self.bypass().or_else(|| self.downstream()) {
                next.call_err(bx, error).await;
            } else {
                self.log(
                    LogLevel::Fail,
                    &ErrorDropped {
                        worker_id: &self.id,
                        error: &error,
                    },
                    bx,
                );
            }
        })
    }

    // Extension points

    pub async fn act(self: &Arc<Self>, bx: &BoxRef, data: Payload) -> Result<(), WorkerError> {
        match &self.hooks.act {
            Some(act) => act(self.clone(), bx.clone(), data).await,
            None => self.logic.act(self, bx, data).await,
        }
    }

    pub async fn err(self: &Arc<Self>, bx: &BoxRef, error: WorkerError) -> Result<(), WorkerError> {
        match &self.hooks.err {
            Some(err) => err(self.clone(), bx.clone(), error).await,
            None => self.logic.err(self, bx, error).await,
        }
    }

    pub fn decide(&self, bx: &TaskBox, stage: Stage<'_>) -> bool {
        match &self.hooks.decide {
            Hook::Default => self.logic.decide(self, bx, stage),
            Hook::Function(decide) => decide(self, bx, stage),
            Hook::Constant(answer) => *answer,
        }
    }

    pub fn filter(&self, bx: &TaskBox, data: Payload) -> Payload {
        match &self.hooks.filter {
            Hook::Default => self.logic.filter(self, bx, data),
            Hook::Function(filter) => filter(self, bx, data),
            Hook::Constant(value) => Payload {
                value: value.clone(),
                ..data
            },
        }
    }

    pub fn merge(&self, bx: &TaskBox, data: Payload, index: Option<usize>) -> Result<Payload, WorkerError> {
        match &self.hooks.merge {
            Hook::Default => self.logic.merge(self, bx, data, index),
            Hook::Function(merge) => merge(self, bx, data, index),
            Hook::Constant(value) => Ok(Payload {
                value: value.clone(),
                ..data
            }),
        }
    }

    /// Merges `data` and hands it to the downstream. A merge error goes to
    /// `fail` instead; with no downstream this is a no-op.
    pub fn pass<'a>(self: &'a Arc<Self>, bx: &'a BoxRef, data: Payload, index: Option<usize>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match self.merge(bx, data, index) {
                Err(error) => self.fail(bx, error).await,
                Ok(data) => {
                    let next = self.downstream();
                    self.log(
                        LogLevel::Pass,
                        &DataPassed {
                            worker_id: &self.id,
                            downstream: next.as_ref().map(|n| n.id()),
                            index: data.index,
                        },
                        bx,
                    );
                    if let Some(next) = next {
                        next.call_act(bx, data).await;
                    }
                }
            }
        })
    }

    /// Forwards `error` down the error path, or drops it at a terminal node.
    pub fn fail<'a>(self: &'a Arc<Self>, bx: &'a BoxRef, error: WorkerError) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match self.downstream() {
                Some(next) => {
                    self.log(
                        LogLevel::Fail,
                        &ErrorForwarded {
                            worker_id: &self.id,
                            downstream: next.id(),
                            error: &error,
                        },
                        bx,
                    );
                    next.call_err(bx, error).await;
                }
                None => self.log(
                    LogLevel::Fail,
                    &ErrorDropped {
                        worker_id: &self.id,
                        error: &error,
                    },
                    bx,
                ),
            }
        })
    }

    // Collaborators

    pub fn cache(&self) -> Result<Arc<dyn Cache>, WorkerError> {
        self.registry.cache(&self.cache)
    }

    pub fn cache_name(&self) -> &str {
        &self.cache
    }

    pub fn codec(&self) -> Result<Arc<dyn Codec>, WorkerError> {
        self.registry.codec(&self.codec)
    }

    pub fn logger(&self) -> Result<Arc<dyn Logger>, WorkerError> {
        self.registry.logger(&self.logger)
    }

    /// Logs through this worker's logger, tagged with the box's request id.
    pub fn log(&self, level: LogLevel, message: &dyn Display, bx: &TaskBox) {
        self.log_with(level, message, bx.rid().as_deref());
    }

    /// Logs outside of any box. Falls back to plain `tracing` when the
    /// logger is not registered.
    pub fn log_with(&self, level: LogLevel, message: &dyn Display, rid: Option<&str>) {
        match self.logger() {
            Ok(logger) => {
                if logger.enabled(&self.id, level) {
                    logger.log(&self.id, level, message, rid);
                }
            }
            Err(_) => emit(&self.id, level, message, rid),
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("downstream", &self.downstream().map(|w| w.id.clone()))
            .field("bypass", &self.bypass().map(|w| w.id.clone()))
            .finish()
    }
}

/// Builds and registers a [`Worker`].
pub struct WorkerBuilder {
    id: String,
    name: Option<String>,
    description: Option<String>,
    logic: Arc<dyn WorkerLogic>,
    hooks: Hooks,
    cache: String,
    codec: String,
    logger: String,
}

impl WorkerBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            logic: Arc::new(PassThrough),
            hooks: Hooks::default(),
            cache: DEFAULT_CACHE.to_string(),
            codec: CONTENT_TYPE_JSON.to_string(),
            logger: DEFAULT_LOGGER.to_string(),
        }
    }

    /// Defaults to the id.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn logic(self, logic: impl WorkerLogic + 'static) -> Self {
        self.shared_logic(Arc::new(logic))
    }

    pub fn shared_logic(mut self, logic: Arc<dyn WorkerLogic>) -> Self {
        self.logic = logic;
        self
    }

    pub fn decide<F>(mut self, decide: F) -> Self
    where
        F: Fn(&Worker, &TaskBox, Stage<'_>) -> bool + Send + Sync + 'static,
    {
        let decide: DecideFn = Arc::new(decide);
        self.hooks.decide = Hook::Function(decide);
        self
    }

    pub fn decide_constant(mut self, answer: bool) -> Self {
        self.hooks.decide = Hook::Constant(answer);
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Worker, &TaskBox, Payload) -> Payload + Send + Sync + 'static,
    {
        let filter: FilterFn = Arc::new(filter);
        self.hooks.filter = Hook::Function(filter);
        self
    }

    pub fn filter_constant(mut self, value: Value) -> Self {
        self.hooks.filter = Hook::Constant(value);
        self
    }

    pub fn merge<F>(mut self, merge: F) -> Self
    where
        F: Fn(&Worker, &TaskBox, Payload, Option<usize>) -> Result<Payload, WorkerError> + Send + Sync + 'static,
    {
        let merge: MergeFn = Arc::new(merge);
        self.hooks.merge = Hook::Function(merge);
        self
    }

    pub fn merge_constant(mut self, value: Value) -> Self {
        self.hooks.merge = Hook::Constant(value);
        self
    }

    pub fn on_act<F, Fut>(mut self, act: F) -> Self
    where
        F: Fn(Arc<Worker>, BoxRef, Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        let act: ActFn = Arc::new(
            move |worker: Arc<Worker>, bx: BoxRef, data: Payload| -> BoxFuture<'static, Result<(), WorkerError>> {
                Box::pin(act(worker, bx, data))
            },
        );
        self.hooks.act = Some(act);
        self
    }

    pub fn on_err<F, Fut>(mut self, err: F) -> Self
    where
        F: Fn(Arc<Worker>, BoxRef, WorkerError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        let err: ErrFn = Arc::new(
            move |worker: Arc<Worker>, bx: BoxRef, error: WorkerError| -> BoxFuture<'static, Result<(), WorkerError>> {
                Box::pin(err(worker, bx, error))
            },
        );
        self.hooks.err = Some(err);
        self
    }

    pub fn cache(mut self, name: impl Into<String>) -> Self {
        self.cache = name.into();
        self
    }

    /// Content type of the codec used for wire encoding.
    pub fn codec(mut self, content_type: impl Into<String>) -> Self {
        self.codec = content_type.into();
        self
    }

    pub fn logger(mut self, name: impl Into<String>) -> Self {
        self.logger = name.into();
        self
    }

    /// Creates the worker and registers its id. Fails if a live worker is
    /// already registered under the same id.
    pub fn build(self, registry: &Arc<Registry>) -> Result<Arc<Worker>, WorkerError> {
        let worker = Arc::new(Worker {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            description: self.description,
            logic: self.logic,
            hooks: self.hooks,
            upstream: RwLock::new(Weak::new()),
            downstream: RwLock::new(None),
            bypass: RwLock::new(None),
            registry: registry.clone(),
            cache: self.cache,
            codec: self.codec,
            logger: self.logger,
        });
        registry.register_worker(&worker)?;
        Ok(worker)
    }
}
