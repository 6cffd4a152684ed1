// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod broadcaster;
pub mod envelope;
pub mod hooks;
pub mod payload;
pub mod queuer;
pub mod registry;
pub mod resolver;
pub mod slicer;
pub mod task_box;
pub mod worker;
#[cfg(test)]
pub mod integration_tests;

pub use broadcaster::{Broadcaster, BroadcasterLogic};
pub use envelope::{BoxIds, ResultKind, Route};
pub use hooks::Hook;
pub use payload::Payload;
pub use queuer::{QueueCore, Queuer, QueuerConfig, QueuerMode};
pub use registry::Registry;
pub use resolver::ResolverLogic;
pub use slicer::SlicerLogic;
pub use task_box::{Barrier, BoxRef, Outcome, ResolveCallback, Settled, TaskBox};
pub use worker::{PassThrough, Segment, Worker, WorkerBuilder};
