// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::engine::{BoxRef, Outcome, Payload, Settled, TaskBox, Worker};
use crate::errors::WorkerError;
use crate::observability::messages::worker::FanInCompleted;
use crate::traits::{LogLevel, Stage, WorkerLogic};

/// Fan-in for the barrier opened under the same worker name.
///
/// Successes and errors both count toward completion, so a failing branch
/// resolves the fan-in with its error instead of leaving it hanging. Boxes
/// without a matching barrier pass straight by.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverLogic {
    collect: bool,
}

impl ResolverLogic {
    /// With `collect` the continuation receives every branch's value in
    /// stamped order; without it, the data the fan-out started from.
    pub fn new(collect: bool) -> Self {
        Self { collect }
    }

    async fn settle(&self, worker: &Arc<Worker>, bx: &BoxRef, outcome: Outcome) {
        match bx.settle(worker.name(), outcome, self.collect) {
            Settled::Missing | Settled::Pending => {}
            Settled::Callback(callback, outcome) => callback(outcome).await,
            Settled::Complete(outcome) => {
                worker.log(
                    LogLevel::Debug,
                    &FanInCompleted {
                        worker_id: worker.id(),
                        name: worker.name(),
                        failed: outcome.is_err(),
                    },
                    bx,
                );
                match outcome {
                    Ok(data) => worker.pass(bx, data, None).await,
                    Err(error) => worker.fail(bx, error).await,
                }
            }
        }
    }
}

#[async_trait]
impl WorkerLogic for ResolverLogic {
    fn kind(&self) -> &'static str {
        "resolver"
    }

    async fn act(&self, worker: &Arc<Worker>, bx: &BoxRef, data: Payload) -> Result<(), WorkerError> {
        self.settle(worker, bx, Ok(data)).await;
        Ok(())
    }

    async fn err(&self, worker: &Arc<Worker>, bx: &BoxRef, error: WorkerError) -> Result<(), WorkerError> {
        self.settle(worker, bx, Err(error)).await;
        Ok(())
    }

    fn decide(&self, worker: &Worker, bx: &TaskBox, _stage: Stage<'_>) -> bool {
        bx.has_resolve(worker.name())
    }
}
