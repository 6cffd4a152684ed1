// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Construction-time overrides of a worker's behaviour.
//!
//! `decide`, `filter` and `merge` are three-way: left at the node type's
//! default, replaced by a function, or pinned to a constant. `act` and `err`
//! can only be replaced by a function.

use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

use crate::engine::{BoxRef, Payload, TaskBox, Worker};
use crate::errors::WorkerError;
use crate::traits::Stage;

pub enum Hook<F, T> {
    Default,
    Function(F),
    Constant(T),
}

impl<F, T> Default for Hook<F, T> {
    fn default() -> Self {
        Hook::Default
    }
}

pub type DecideFn = Arc<dyn Fn(&Worker, &TaskBox, Stage<'_>) -> bool + Send + Sync>;
pub type FilterFn = Arc<dyn Fn(&Worker, &TaskBox, Payload) -> Payload + Send + Sync>;
pub type MergeFn =
    Arc<dyn Fn(&Worker, &TaskBox, Payload, Option<usize>) -> Result<Payload, WorkerError> + Send + Sync>;
pub type ActFn =
    Arc<dyn Fn(Arc<Worker>, BoxRef, Payload) -> BoxFuture<'static, Result<(), WorkerError>> + Send + Sync>;
pub type ErrFn =
    Arc<dyn Fn(Arc<Worker>, BoxRef, WorkerError) -> BoxFuture<'static, Result<(), WorkerError>> + Send + Sync>;

#[derive(Default)]
pub struct Hooks {
    pub decide: Hook<DecideFn, bool>,
    pub filter: Hook<FilterFn, Value>,
    pub merge: Hook<MergeFn, Value>,
    pub act: Option<ActFn>,
    pub err: Option<ErrFn>,
}
