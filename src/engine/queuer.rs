// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Distributed, backpressured task queue node.
//!
//! A Queuer turns a local hop into a broker hand-off. One instance runs in
//! one of four modes:
//!
//! * `simple` - opens a callback barrier and passes in-process; the paired
//!   Resolver's completion is delivered to the optional outlet worker
//! * `handler` - listens on its own name, pops tasks from the list of the
//!   same name through a bounded pool and feeds them to its pipeline; the
//!   paired Resolver publishes the result
//! * `pusher` - pushes tasks onto `data.queue` and collects results
//!   announced on the `return` channel
//! * `streamer` - like `pusher`, for multi-part results keyed by `sid` and
//!   announced on the `stream` channel
//!
//! Originating boxes wait in a local table keyed by `bid` (or `sid`) until
//! their outstanding results arrive. Producers registered on a box as
//! throttles are paused while the target queue is at its high-water mark
//! and resumed on the next result notification.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::consts::{
    CONTENT_TYPE_JSON, DEFAULT_CONCURRENCY, DEFAULT_EXPIRE_MS, DEFAULT_HIGH_WATER_MARK, RETURN_CHANNEL,
    STREAM_CHANNEL,
};
use crate::engine::envelope::{
    parse_result_id, read_index, result_id, stamp_index, BoxIds, ResultKind, ResultOut, ResultRecord, Route,
    TaskEnvelope,
};
use crate::engine::{Barrier, BoxRef, Outcome, Payload, Registry, TaskBox, Worker, WorkerBuilder};
use crate::errors::{transform_error, WorkerError};
use crate::observability::messages::queue::{
    FinalizationNotShared, ListenerStarted, ListenerStopped, ProducerPaused, ProducersResumed, QueueDrained,
    QueueFailure, ResultCollected, ResultPublished, TaskPushed, TaskTaken,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{Broker, BrokerOp, CodecOptions, LogLevel, Throttle, WorkerLogic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuerMode {
    #[default]
    Simple,
    Handler,
    Pusher,
    Streamer,
}

impl QueuerMode {
    /// Broker channel this mode listens on, if any.
    fn channel<'a>(&self, name: &'a str) -> Option<&'a str> {
        match self {
            QueuerMode::Simple => None,
            QueuerMode::Handler => Some(name),
            QueuerMode::Pusher => Some(RETURN_CHANNEL),
            QueuerMode::Streamer => Some(STREAM_CHANNEL),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueuerConfig {
    pub mode: QueuerMode,
    /// Tasks a handler processes at once.
    pub concurrency: usize,
    /// Queue depth at which producers are paused.
    pub high_water_mark: usize,
    /// Lifetime of an unread result, in milliseconds.
    pub expire_ms: u64,
    /// Queues that must all report before a result is marked final.
    #[serde(rename = "final")]
    pub final_queues: Vec<String>,
    pub content_type: String,
}

impl Default for QueuerConfig {
    fn default() -> Self {
        Self {
            mode: QueuerMode::Simple,
            concurrency: DEFAULT_CONCURRENCY,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            expire_ms: DEFAULT_EXPIRE_MS,
            final_queues: Vec::new(),
            content_type: CONTENT_TYPE_JSON.to_string(),
        }
    }
}

impl QueuerConfig {
    pub fn with_mode(mode: QueuerMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn expire(&self) -> Duration {
        Duration::from_millis(self.expire_ms)
    }
}

struct Origin {
    bx: BoxRef,
    pending: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between a Queuer's worker, its listener and its barriers.
pub struct QueueCore {
    config: QueuerConfig,
    worker: OnceLock<Weak<Worker>>,
    broker: RwLock<Arc<dyn Broker>>,
    origins: Mutex<HashMap<String, Origin>>,
    paused: Mutex<Vec<Arc<dyn Throttle>>>,
    pool: Arc<Semaphore>,
    drained: AtomicBool,
    listener: Mutex<Option<CancellationToken>>,
    outlet: RwLock<Option<Arc<Worker>>>,
    warned_unshared: AtomicBool,
}

impl QueueCore {
    fn new(config: QueuerConfig, broker: Arc<dyn Broker>) -> Self {
        Self {
            pool: Arc::new(Semaphore::new(config.concurrency.max(1))),
            config,
            worker: OnceLock::new(),
            broker: RwLock::new(broker),
            origins: Mutex::new(HashMap::new()),
            paused: Mutex::new(Vec::new()),
            drained: AtomicBool::new(true),
            listener: Mutex::new(None),
            outlet: RwLock::new(None),
            warned_unshared: AtomicBool::new(false),
        }
    }

    fn worker(&self) -> Option<Arc<Worker>> {
        self.worker.get().and_then(Weak::upgrade)
    }

    fn broker(&self) -> Arc<dyn Broker> {
        self.broker.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn outlet(&self) -> Option<Arc<Worker>> {
        self.outlet.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    // Origin table

    fn track(&self, key: &str, bx: &BoxRef) {
        lock(&self.origins)
            .entry(key.to_string())
            .or_insert_with(|| Origin {
                bx: bx.clone(),
                pending: 0,
            })
            .pending += 1;
    }

    fn untrack(&self, key: &str) {
        let mut origins = lock(&self.origins);
        if let Some(origin) = origins.get_mut(key) {
            origin.pending = origin.pending.saturating_sub(1);
            if origin.pending == 0 {
                origins.remove(key);
            }
        }
    }

    fn origin(&self, key: &str) -> Option<BoxRef> {
        lock(&self.origins).get(key).map(|o| o.bx.clone())
    }

    /// Counts one result against its origin. Returns whether that was the
    /// last outstanding one and the entry was removed.
    fn settle_origin(&self, key: &str) -> bool {
        let mut origins = lock(&self.origins);
        match origins.get_mut(key) {
            Some(origin) if origin.pending > 1 => {
                origin.pending -= 1;
                false
            }
            Some(_) => origins.remove(key).is_some(),
            None => false,
        }
    }

    // Backpressure

    pub fn throttle_pause(&self, worker: &Worker, bx: &TaskBox, queue: &str, depth: usize) {
        let Some(handle) = bx.throttle(queue) else {
            return;
        };
        handle.pause();
        lock(&self.paused).push(handle);
        worker.log(
            LogLevel::Warn,
            &ProducerPaused {
                worker_id: worker.id(),
                queue,
                depth,
                high_water_mark: self.config.high_water_mark,
            },
            bx,
        );
    }

    pub fn throttle_resume(&self, worker: &Worker) {
        let resumed: Vec<Arc<dyn Throttle>> = lock(&self.paused).drain(..).collect();
        if resumed.is_empty() {
            return;
        }
        for handle in &resumed {
            handle.resume();
        }
        worker.log_with(
            LogLevel::Info,
            &ProducersResumed {
                worker_id: worker.id(),
                count: resumed.len(),
            },
            None,
        );
    }

    // Enqueue

    /// Validates, registers and publishes one task.
    pub async fn push_task(&self, worker: &Worker, bx: &BoxRef, data: &Payload) -> Result<(), WorkerError> {
        let route = Route::from_data(&data.value)?;
        match (self.config.mode, route.result) {
            (QueuerMode::Pusher, ResultKind::Stream) => {
                return Err(WorkerError::BadRequest(
                    "a pusher cannot request streamed results".to_string(),
                ))
            }
            (QueuerMode::Streamer, ResultKind::Return) => {
                return Err(WorkerError::BadRequest(
                    "a streamer cannot request a single return".to_string(),
                ))
            }
            _ => {}
        }

        let broker = self.broker();
        if broker.subscribers(&route.queue).await? == 0 {
            return Err(WorkerError::NotFound(format!(
                "no consumer is listening on '{}'",
                route.queue
            )));
        }

        let bid = bx.ensure_bid();
        let key = match route.result {
            ResultKind::Stream => bx.ensure_sid(),
            _ => bid.clone(),
        };
        let tracked = route.result != ResultKind::None;
        if tracked {
            self.track(&key, bx);
        }

        let pushed = self.enqueue(worker, broker.as_ref(), bx, &route, data, &bid).await;
        if pushed.is_err() && tracked {
            self.untrack(&key);
        }
        pushed
    }

    async fn enqueue(
        &self,
        worker: &Worker,
        broker: &dyn Broker,
        bx: &BoxRef,
        route: &Route,
        data: &Payload,
        bid: &str,
    ) -> Result<(), WorkerError> {
        let depth = broker.llen(&route.queue).await?;
        if depth >= self.config.high_water_mark {
            self.throttle_pause(worker, bx, &route.queue, depth);
        }

        let envelope = TaskEnvelope {
            ids: bx.ids(),
            data: stamp_index(&data.value, data.index),
        };
        let encoded = worker
            .codec()?
            .stringify(&serde_json::to_value(&envelope)?, &CodecOptions::default())
            .await?;

        broker
            .exec(vec![
                BrokerOp::LPush {
                    key: route.queue.clone(),
                    value: encoded,
                },
                BrokerOp::Publish {
                    channel: route.queue.clone(),
                    message: route.queue.clone().into_bytes(),
                },
            ])
            .await?;

        worker.log(
            LogLevel::Info,
            &TaskPushed {
                worker_id: worker.id(),
                queue: &route.queue,
                bid,
                depth,
            },
            bx,
        );
        Ok(())
    }

    // Dequeue

    /// Takes one task if the pool has room. A successful pop schedules the
    /// next attempt right away so a backlog fills every free slot, and every
    /// completed task schedules another, so it drains without polling.
    pub fn handle_task(self: &Arc<Self>) -> BoxFuture<'static, ()> {
        let core = self.clone();
        Box::pin(async move {
            let Some(worker) = core.worker() else {
                return;
            };
            let Ok(permit) = core.pool.clone().try_acquire_owned() else {
                return;
            };

            let popped = match core.broker().rpop(worker.name()).await {
                Ok(popped) => popped,
                Err(error) => {
                    core.report(&worker, "pop", &error);
                    return;
                }
            };
            let Some(encoded) = popped else {
                core.drained.store(true, Ordering::SeqCst);
                worker.log_with(
                    LogLevel::Debug,
                    &QueueDrained {
                        worker_id: worker.id(),
                        queue: worker.name(),
                    },
                    None,
                );
                return;
            };
            core.drained.store(false, Ordering::SeqCst);
            tokio::spawn(core.handle_task());

            if let Err(error) = core.run_task(&worker, &encoded).await {
                core.report(&worker, "task decode", &error);
            }
            drop(permit);
            tokio::spawn(core.handle_task());
        })
    }

    async fn run_task(self: &Arc<Self>, worker: &Arc<Worker>, encoded: &[u8]) -> Result<(), WorkerError> {
        let decoded = worker.codec()?.parse(encoded, &CodecOptions::default()).await?;
        let envelope: TaskEnvelope = serde_json::from_value(decoded)?;
        let route = Route::from_data(&envelope.data)?;
        let index = read_index(&envelope.data);
        let bx = TaskBox::restore(envelope.ids);

        worker.log(
            LogLevel::Debug,
            &TaskTaken {
                worker_id: worker.id(),
                queue: &route.queue,
                bid: bx.bid().as_deref(),
            },
            &bx,
        );

        // The result path owns completion of this box.
        let core = self.clone();
        let owner = worker.clone();
        let ids = bx.ids();
        bx.set_up_resolve(
            worker.name(),
            Barrier::callback(envelope.data.clone(), move |outcome| async move {
                core.push_result(&owner, &ids, &route, index, outcome).await;
            }),
        )?;

        let data = Payload {
            value: envelope.data,
            index,
            last: None,
        };
        worker.pass(&bx, data, None).await;
        Ok(())
    }

    // Results

    /// Stores and announces the result of one task. Failures are logged;
    /// there is no pipeline left to route them to.
    pub async fn push_result(&self, worker: &Worker, ids: &BoxIds, route: &Route, index: Option<usize>, outcome: Outcome) {
        if let Err(error) = self.publish_result(worker, ids, route, index, outcome).await {
            self.report(worker, "result publish", &error);
        }
    }

    async fn publish_result(
        &self,
        worker: &Worker,
        ids: &BoxIds,
        route: &Route,
        index: Option<usize>,
        outcome: Outcome,
    ) -> Result<(), WorkerError> {
        let Some(channel) = route.result.channel() else {
            return Ok(());
        };
        let key = match route.result {
            ResultKind::Stream => ids.sid.as_deref(),
            _ => ids.bid.as_deref(),
        }
        .ok_or_else(|| WorkerError::BadRequest(format!("{} result without a correlation id", channel)))?;
        let id = result_id(key, index);
        let last = self.check_final(worker, ids.bid.as_deref(), &route.queue).await?;

        let (data, error) = match outcome {
            Ok(payload) => (payload.value, None),
            Err(error) => (Value::Null, Some(error.to_wire())),
        };
        let record = ResultRecord {
            out: ResultOut { data, error, last },
            queue: route.queue.clone(),
            result: route.result,
            index,
        };
        let encoded = worker
            .codec()?
            .stringify(&serde_json::to_value(&record)?, &CodecOptions::default())
            .await?;

        self.broker()
            .exec(vec![
                BrokerOp::Set {
                    key: id.clone(),
                    value: encoded,
                    ttl: Some(self.config.expire()),
                },
                BrokerOp::Publish {
                    channel: channel.to_string(),
                    message: id.clone().into_bytes(),
                },
            ])
            .await?;

        worker.log_with(
            LogLevel::Debug,
            &ResultPublished {
                worker_id: worker.id(),
                id: &id,
                channel,
                last,
            },
            ids.rid.as_deref(),
        );
        Ok(())
    }

    /// Whether a result from `queue` completes its task.
    ///
    /// With no `final` queues configured every result is final. Otherwise
    /// each listed queue reports once per task on the cache, and the result
    /// that makes the last one report is final.
    pub async fn check_final(&self, worker: &Worker, bid: Option<&str>, queue: &str) -> Result<bool, WorkerError> {
        let finals = &self.config.final_queues;
        if finals.is_empty() {
            return Ok(true);
        }
        let Some(bid) = bid.filter(|_| finals.iter().any(|q| q == queue)) else {
            return Ok(false);
        };

        let cache = worker.cache()?;
        if !cache.is_shared() && !self.warned_unshared.swap(true, Ordering::SeqCst) {
            FinalizationNotShared {
                worker_id: worker.id(),
                cache: worker.cache_name(),
            }
            .log();
        }

        let ttl = Some(self.config.expire());
        let seen = cache.increment(&format!("{}:final:{}", bid, queue), 1, ttl).await?;
        if seen != 1 {
            return Ok(false);
        }
        let reported = cache.increment(&format!("{}:final", bid), 1, ttl).await?;
        Ok(reported == finals.len() as i64)
    }

    /// Collects one announced result and resumes the originating pipeline.
    pub async fn handle_result(&self, worker: &Arc<Worker>, message: &[u8]) {
        // Any consumption frees broker capacity.
        self.throttle_resume(worker);

        let Ok(id) = std::str::from_utf8(message) else {
            return;
        };
        let Some((key, index)) = parse_result_id(id) else {
            return;
        };
        let Some(bx) = self.origin(key) else {
            // Someone else's result.
            return;
        };

        let stored = self
            .broker()
            .exec(vec![
                BrokerOp::Get { key: id.to_string() },
                BrokerOp::Del { key: id.to_string() },
            ])
            .await
            .and_then(|replies| match replies.into_iter().next() {
                Some(reply) => reply.into_bytes(),
                None => Ok(None),
            });

        let released = self.settle_origin(key);
        worker.log(
            LogLevel::Debug,
            &ResultCollected {
                worker_id: worker.id(),
                id,
                released,
            },
            &bx,
        );

        let record = match stored {
            Ok(Some(encoded)) => self.decode_result(worker, &encoded).await,
            Ok(None) => Err(WorkerError::ResultExpired { id: id.to_string() }),
            Err(error) => Err(error),
        };

        match record {
            Ok(record) => match record.out.error {
                Some(wire) => worker.fail(&bx, transform_error(wire)).await,
                None => {
                    let data = Payload {
                        value: record.out.data,
                        index: record.index.or(Some(index)),
                        last: Some(record.out.last),
                    };
                    worker.pass(&bx, data, None).await
                }
            },
            Err(error) => worker.fail(&bx, error).await,
        }
    }

    async fn decode_result(&self, worker: &Worker, encoded: &[u8]) -> Result<ResultRecord, WorkerError> {
        let decoded = worker.codec()?.parse(encoded, &CodecOptions::default()).await?;
        Ok(serde_json::from_value(decoded)?)
    }

    fn report(&self, worker: &Worker, operation: &str, error: &WorkerError) {
        QueueFailure {
            worker_id: worker.id(),
            operation,
            error,
        }
        .log();
    }

    // Listener

    async fn start(self: &Arc<Self>) -> Result<(), WorkerError> {
        let Some(worker) = self.worker() else {
            return Ok(());
        };
        let Some(channel) = self.config.mode.channel(worker.name()).map(str::to_string) else {
            return Ok(());
        };

        self.stop();
        let mut subscription = self.broker().subscribe(&channel).await?;
        let token = CancellationToken::new();
        *lock(&self.listener) = Some(token.clone());

        ListenerStarted {
            worker_id: worker.id(),
            channel: &channel,
        }
        .log();

        let core = self.clone();
        let mode = self.config.mode;
        let worker_id = worker.id().to_string();
        drop(worker);

        tokio::spawn(async move {
            if mode == QueuerMode::Handler {
                tokio::spawn(core.handle_task());
            }
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    message = subscription.recv() => {
                        let Some(message) = message else { break };
                        let Some(worker) = core.worker() else { break };
                        if mode == QueuerMode::Handler {
                            tokio::spawn(core.handle_task());
                        } else {
                            let core = core.clone();
                            tokio::spawn(async move { core.handle_result(&worker, &message).await });
                        }
                    }
                }
            }
            ListenerStopped {
                worker_id: &worker_id,
                channel: subscription.channel(),
            }
            .log();
        });
        Ok(())
    }

    fn stop(&self) {
        if let Some(token) = lock(&self.listener).take() {
            token.cancel();
        }
    }
}

/// Queuer behaviour plugged into its worker.
pub struct QueuerLogic {
    core: Arc<QueueCore>,
}

#[async_trait]
impl WorkerLogic for QueuerLogic {
    fn kind(&self) -> &'static str {
        "queuer"
    }

    async fn act(&self, worker: &Arc<Worker>, bx: &BoxRef, data: Payload) -> Result<(), WorkerError> {
        match self.core.config.mode {
            QueuerMode::Simple => {
                let core = self.core.clone();
                let origin = Arc::downgrade(bx);
                let owner = Arc::downgrade(worker);
                bx.set_up_resolve(
                    worker.name(),
                    Barrier::callback(data.value.clone(), move |outcome| async move {
                        if let (Some(outlet), Some(bx)) = (core.outlet(), origin.upgrade()) {
                            match outcome {
                                Ok(data) => outlet.call_act(&bx, data).await,
                                Err(error) => outlet.call_err(&bx, error).await,
                            }
                        }
                        if let Some(worker) = owner.upgrade() {
                            core.throttle_resume(&worker);
                        }
                    }),
                )?;
                worker.pass(bx, data, None).await;
            }
            QueuerMode::Handler => worker.pass(bx, data, None).await,
            QueuerMode::Pusher | QueuerMode::Streamer => {
                if let Err(error) = self.core.push_task(worker, bx, &data).await {
                    worker.fail(bx, error).await;
                }
            }
        }
        Ok(())
    }
}

/// Handle on a queueing worker.
#[derive(Clone)]
pub struct Queuer {
    worker: Arc<Worker>,
    core: Arc<QueueCore>,
}

impl Queuer {
    pub fn build(
        builder: WorkerBuilder,
        config: QueuerConfig,
        broker: Arc<dyn Broker>,
        registry: &Arc<Registry>,
    ) -> Result<Self, WorkerError> {
        let content_type = config.content_type.clone();
        let core = Arc::new(QueueCore::new(config, broker));
        let logic = Arc::new(QueuerLogic { core: core.clone() });
        let worker = builder.codec(content_type).shared_logic(logic).build(registry)?;
        let _ = core.worker.set(Arc::downgrade(&worker));
        Ok(Self { worker, core })
    }

    pub fn worker(&self) -> &Arc<Worker> {
        &self.worker
    }

    pub fn core(&self) -> &Arc<QueueCore> {
        &self.core
    }

    pub fn config(&self) -> &QueuerConfig {
        &self.core.config
    }

    pub fn mode(&self) -> QueuerMode {
        self.core.config.mode
    }

    /// Subscribes to the mode's channel and starts listening. A handler
    /// also drains whatever is already queued. No-op in simple mode.
    pub async fn start(&self) -> Result<(), WorkerError> {
        self.core.start().await
    }

    pub fn stop(&self) {
        self.core.stop();
    }

    /// Replaces the broker connection. The current listener is torn down;
    /// call [`Queuer::start`] again to listen on the new broker.
    pub fn set_broker(&self, broker: Arc<dyn Broker>) {
        self.core.stop();
        *self.core.broker.write().unwrap_or_else(PoisonError::into_inner) = broker;
    }

    /// Worker receiving simple-mode completions.
    pub fn set_outlet(&self, outlet: Option<Arc<Worker>>) {
        *self.core.outlet.write().unwrap_or_else(PoisonError::into_inner) = outlet;
    }

    pub async fn push_task(&self, bx: &BoxRef, data: &Payload) -> Result<(), WorkerError> {
        self.core.push_task(&self.worker, bx, data).await
    }

    pub fn handle_task(&self) -> BoxFuture<'static, ()> {
        self.core.handle_task()
    }

    pub async fn handle_result(&self, message: &[u8]) {
        self.core.handle_result(&self.worker, message).await
    }

    pub async fn check_final(&self, bid: &str, queue: &str) -> Result<bool, WorkerError> {
        self.core.check_final(&self.worker, Some(bid), queue).await
    }

    /// Forgets an originating box without waiting for its results.
    pub fn release(&self, key: &str) -> bool {
        lock(&self.core.origins).remove(key).is_some()
    }

    pub fn is_tracking(&self, key: &str) -> bool {
        lock(&self.core.origins).contains_key(key)
    }

    pub fn origin_count(&self) -> usize {
        lock(&self.core.origins).len()
    }

    pub fn paused_count(&self) -> usize {
        lock(&self.core.paused).len()
    }

    pub fn is_drained(&self) -> bool {
        self.core.drained.load(Ordering::SeqCst)
    }
}
