// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;

use crate::engine::{Barrier, BoxRef, Payload, TaskBox, Worker};
use crate::errors::WorkerError;
use crate::observability::messages::worker::{FanOutStarted, InputAbsorbed};
use crate::traits::{LogLevel, WorkerLogic};

pub type SliceFn = Arc<dyn Fn(&TaskBox, &Payload) -> Vec<Value> + Send + Sync>;

/// Fan-out over the pieces of its input.
///
/// Opens a counting barrier under the worker's name, then passes every
/// slice stamped with its position. A Resolver with the same name collects
/// them back in order.
#[derive(Clone, Default)]
pub struct SlicerLogic {
    slice: Option<SliceFn>,
}

impl SlicerLogic {
    /// Slices array input into its elements; anything else has no slices.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slice<F>(slice: F) -> Self
    where
        F: Fn(&TaskBox, &Payload) -> Vec<Value> + Send + Sync + 'static,
    {
        Self {
            slice: Some(Arc::new(slice)),
        }
    }

    pub fn slice(&self, bx: &TaskBox, data: &Payload) -> Vec<Value> {
        match &self.slice {
            Some(slice) => slice(bx, data),
            None => data.value.as_array().cloned().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl WorkerLogic for SlicerLogic {
    fn kind(&self) -> &'static str {
        "slicer"
    }

    async fn act(&self, worker: &Arc<Worker>, bx: &BoxRef, data: Payload) -> Result<(), WorkerError> {
        let slices = self.slice(bx, &data);
        // Nothing to fan out: no barrier opens, bypass or absorb.
        if slices.is_empty() {
            match worker.bypass() {
                Some(bypass) => bypass.call_act(bx, data).await,
                None => worker.log(LogLevel::Debug, &InputAbsorbed { worker_id: worker.id() }, bx),
            }
            return Ok(());
        }

        bx.set_up_resolve(worker.name(), Barrier::count(data.value, slices.len()))?;
        worker.log(
            LogLevel::Debug,
            &FanOutStarted {
                worker_id: worker.id(),
                name: worker.name(),
                branches: slices.len(),
                barrier: true,
            },
            bx,
        );

        // Dispatch starts in index order; completions interleave freely.
        let branches = slices
            .into_iter()
            .enumerate()
            .map(|(index, slice)| worker.pass(bx, Payload::new(slice), Some(index)));
        join_all(branches).await;
        Ok(())
    }

    fn merge(
        &self,
        _worker: &Worker,
        _bx: &TaskBox,
        data: Payload,
        index: Option<usize>,
    ) -> Result<Payload, WorkerError> {
        Ok(Payload {
            index: index.or(data.index),
            ..data
        })
    }
}
