// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};

use crate::engine::{Barrier, BoxRef, Payload, Registry, Segment, TaskBox, Worker, WorkerBuilder};
use crate::errors::WorkerError;
use crate::observability::messages::worker::FanOutStarted;
use crate::traits::{LogLevel, Stage, WorkerLogic};

/// Fan-out of the same input to a fixed set of branches.
pub struct BroadcasterLogic {
    branches: RwLock<Vec<Arc<Worker>>>,
    resolve: bool,
}

impl BroadcasterLogic {
    /// With `resolve` false the broadcast is fire and forget: no barrier is
    /// opened and no Resolver is expected.
    pub fn new(resolve: bool) -> Self {
        Self {
            branches: RwLock::new(Vec::new()),
            resolve,
        }
    }

    pub fn branches(&self) -> Vec<Arc<Worker>> {
        self.branches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, branch: Arc<Worker>) {
        self.branches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(branch);
    }
}

#[async_trait]
impl WorkerLogic for BroadcasterLogic {
    fn kind(&self) -> &'static str {
        "broadcaster"
    }

    async fn act(&self, worker: &Arc<Worker>, bx: &BoxRef, data: Payload) -> Result<(), WorkerError> {
        let branches = self.branches();
        if branches.is_empty() {
            worker.pass(bx, data, None).await;
            return Ok(());
        }

        if self.resolve {
            bx.set_up_resolve(worker.name(), Barrier::count(data.value.clone(), branches.len()))?;
        }
        worker.log(
            LogLevel::Debug,
            &FanOutStarted {
                worker_id: worker.id(),
                name: worker.name(),
                branches: branches.len(),
                barrier: self.resolve,
            },
            bx,
        );

        join_all(branches.iter().map(|branch| branch.call_act(bx, data.clone()))).await;
        Ok(())
    }

    /// Errors reach the branches only when a Resolver will collapse them
    /// again; a fire and forget broadcast forwards the error once.
    async fn err(&self, worker: &Arc<Worker>, bx: &BoxRef, error: WorkerError) -> Result<(), WorkerError> {
        let branches = self.branches();
        if branches.is_empty() || !self.resolve {
            worker.fail(bx, error).await;
            return Ok(());
        }

        bx.set_up_resolve(worker.name(), Barrier::count(Value::Null, branches.len()))?;
        join_all(branches.iter().map(|branch| branch.call_err(bx, error.clone()))).await;
        Ok(())
    }

    fn decide(&self, _worker: &Worker, _bx: &TaskBox, _stage: Stage<'_>) -> bool {
        true
    }
}

/// Handle on a broadcasting worker and its branch list.
#[derive(Clone)]
pub struct Broadcaster {
    worker: Arc<Worker>,
    logic: Arc<BroadcasterLogic>,
}

impl Broadcaster {
    pub fn build(builder: WorkerBuilder, resolve: bool, registry: &Arc<Registry>) -> Result<Self, WorkerError> {
        let logic = Arc::new(BroadcasterLogic::new(resolve));
        let worker = builder.shared_logic(logic.clone()).build(registry)?;
        Ok(Self { worker, logic })
    }

    pub fn worker(&self) -> &Arc<Worker> {
        &self.worker
    }

    /// Adds a branch and returns its exit.
    pub fn attach(&self, branch: impl Into<Segment>) -> Arc<Worker> {
        let segment = branch.into();
        segment.entry.set_upstream(&self.worker);
        self.logic.push(segment.entry);
        segment.exit
    }

    pub fn branches(&self) -> Vec<Arc<Worker>> {
        self.logic.branches()
    }
}
