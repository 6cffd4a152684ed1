// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::engine::{BoxRef, Payload, TaskBox, Worker};
use crate::errors::WorkerError;

/// What a worker is being asked to decide about.
#[derive(Debug, Clone, Copy)]
pub enum Stage<'a> {
    Act(&'a Payload),
    Err(&'a WorkerError),
}

impl Stage<'_> {
    pub fn is_act(&self) -> bool {
        matches!(self, Stage::Act(_))
    }
}

/// Behaviour of a reusable node type.
///
/// Every method has the plain-worker default, so a node type only overrides
/// what it specialises. Slicer and Queuer override `act`; Broadcaster and
/// Resolver override `act`, `err` and `decide`.
/// Per-instance customisation goes through hooks on the worker instead.
#[async_trait]
pub trait WorkerLogic: Send + Sync {
    /// Short name of the node type, used in logs.
    fn kind(&self) -> &'static str;

    async fn act(&self, worker: &Arc<Worker>, bx: &BoxRef, data: Payload) -> Result<(), WorkerError> {
        worker.pass(bx, data, None).await;
        Ok(())
    }

    async fn err(&self, worker: &Arc<Worker>, bx: &BoxRef, error: WorkerError) -> Result<(), WorkerError> {
        worker.fail(bx, error).await;
        Ok(())
    }

    /// Errors bubble past a worker unless it opts in.
    fn decide(&self, _worker: &Worker, _bx: &TaskBox, stage: Stage<'_>) -> bool {
        stage.is_act()
    }

    fn filter(&self, _worker: &Worker, _bx: &TaskBox, data: Payload) -> Payload {
        data
    }

    fn merge(
        &self,
        _worker: &Worker,
        _bx: &TaskBox,
        data: Payload,
        _index: Option<usize>,
    ) -> Result<Payload, WorkerError> {
        Ok(data)
    }
}
