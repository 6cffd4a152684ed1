// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for pipeline hop events.
//!
//! These are usually rendered through a worker's `Logger` collaborator so
//! that per-level patterns can switch them on or off per worker id:
//! * Data passed downstream and errors forwarded or dropped
//! * `act`/`err` failures rerouted to the error path
//! * Fan-out dispatch and fan-in completion

use crate::errors::WorkerError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A worker handed data to its downstream.
///
/// # Log Level
/// `pass` - Pipeline traffic
pub struct DataPassed<'a> {
    pub worker_id: &'a str,
    pub downstream: Option<&'a str>,
    pub index: Option<usize>,
}

impl Display for DataPassed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match (self.downstream, self.index) {
            (Some(next), Some(index)) => write!(f, "Passing slice {} to '{}'", index, next),
            (Some(next), None) => write!(f, "Passing data to '{}'", next),
            (None, _) => write!(f, "No downstream, data absorbed"),
        }
    }
}

impl StructuredLog for DataPassed<'_> {
    fn log(&self) {
        tracing::debug!(
            worker_id = self.worker_id,
            downstream = self.downstream,
            index = self.index,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "pass",
            span_name = name,
            worker_id = self.worker_id,
            downstream = self.downstream,
        )
    }
}

/// A worker declined its input and had nowhere to send it.
///
/// # Log Level
/// `debug` - Diagnostic detail
pub struct InputAbsorbed<'a> {
    pub worker_id: &'a str,
}

impl Display for InputAbsorbed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker '{}' declined input with no bypass or downstream", self.worker_id)
    }
}

impl StructuredLog for InputAbsorbed<'_> {
    fn log(&self) {
        tracing::debug!(worker_id = self.worker_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("absorbed", span_name = name, worker_id = self.worker_id)
    }
}

/// `act` or `err` returned an error and it is being rerouted.
///
/// # Log Level
/// `error` - Failure requiring attention
///
/// # Example
/// ```
/// use the_relay::errors::WorkerError;
/// use the_relay::observability::messages::worker::HandlerFailed;
///
/// let error = WorkerError::application("upstream timed out");
/// let msg = HandlerFailed {
///     worker_id: "fetch",
///     stage: "act",
///     error: &error,
/// };
///
/// assert_eq!(msg.to_string(), "Worker 'fetch' failed in act: 500 upstream timed out");
/// ```
pub struct HandlerFailed<'a> {
    pub worker_id: &'a str,
    pub stage: &'a str,
    pub error: &'a WorkerError,
}

impl Display for HandlerFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker '{}' failed in {}: {}", self.worker_id, self.stage, self.error)
    }
}

impl StructuredLog for HandlerFailed<'_> {
    fn log(&self) {
        tracing::error!(
            worker_id = self.worker_id,
            stage = self.stage,
            code = self.error.code(),
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "handler_failed",
            span_name = name,
            worker_id = self.worker_id,
            stage = self.stage,
            code = self.error.code(),
        )
    }
}

/// An error is forwarded to the downstream error path.
///
/// # Log Level
/// `fail` - Pipeline traffic
pub struct ErrorForwarded<'a> {
    pub worker_id: &'a str,
    pub downstream: &'a str,
    pub error: &'a WorkerError,
}

impl Display for ErrorForwarded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Forwarding error to '{}': {}", self.downstream, self.error)
    }
}

impl StructuredLog for ErrorForwarded<'_> {
    fn log(&self) {
        tracing::debug!(
            worker_id = self.worker_id,
            downstream = self.downstream,
            code = self.error.code(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "fail",
            span_name = name,
            worker_id = self.worker_id,
            downstream = self.downstream,
        )
    }
}

/// An error reached a worker with no downstream and was dropped.
///
/// # Log Level
/// `fail` - Pipeline traffic; usually means an error chain is not terminated
pub struct ErrorDropped<'a> {
    pub worker_id: &'a str,
    pub error: &'a WorkerError,
}

impl Display for ErrorDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Error dropped at '{}' with no downstream: {}", self.worker_id, self.error)
    }
}

impl StructuredLog for ErrorDropped<'_> {
    fn log(&self) {
        tracing::warn!(
            worker_id = self.worker_id,
            code = self.error.code(),
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("dropped", span_name = name, worker_id = self.worker_id)
    }
}

/// A fan-out opened its barrier and is dispatching branches.
///
/// # Log Level
/// `debug` - Diagnostic detail
pub struct FanOutStarted<'a> {
    pub worker_id: &'a str,
    pub name: &'a str,
    pub branches: usize,
    pub barrier: bool,
}

impl Display for FanOutStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.barrier {
            write!(f, "Fanning out '{}' to {} branches", self.name, self.branches)
        } else {
            write!(f, "Broadcasting '{}' to {} branches without a barrier", self.name, self.branches)
        }
    }
}

impl StructuredLog for FanOutStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            worker_id = self.worker_id,
            name = self.name,
            branches = self.branches,
            barrier = self.barrier,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "fan_out",
            span_name = name,
            worker_id = self.worker_id,
            branches = self.branches,
        )
    }
}

/// A fan-in barrier completed a wave.
///
/// # Log Level
/// `debug` - Diagnostic detail
pub struct FanInCompleted<'a> {
    pub worker_id: &'a str,
    pub name: &'a str,
    pub failed: bool,
}

impl Display for FanInCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let outcome = if self.failed { "with an error" } else { "successfully" };
        write!(f, "Fan-in '{}' completed {}", self.name, outcome)
    }
}

impl StructuredLog for FanInCompleted<'_> {
    fn log(&self) {
        tracing::debug!(
            worker_id = self.worker_id,
            name = self.name,
            failed = self.failed,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("fan_in", span_name = name, worker_id = self.worker_id)
    }
}
