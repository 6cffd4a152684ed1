// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for distributed queue events.
//!
//! This module contains message types for logging events related to:
//! * Task publication and consumption
//! * Result publication and collection
//! * Producer backpressure
//! * Broker listeners

use crate::errors::WorkerError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A task was pushed onto a broker queue.
///
/// # Log Level
/// `info` - Queue traffic
pub struct TaskPushed<'a> {
    pub worker_id: &'a str,
    pub queue: &'a str,
    pub bid: &'a str,
    pub depth: usize,
}

impl Display for TaskPushed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Pushed task {} onto '{}' (depth before push: {})", self.bid, self.queue, self.depth)
    }
}

impl StructuredLog for TaskPushed<'_> {
    fn log(&self) {
        tracing::info!(
            worker_id = self.worker_id,
            queue = self.queue,
            bid = self.bid,
            depth = self.depth,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "task_pushed",
            span_name = name,
            worker_id = self.worker_id,
            queue = self.queue,
            bid = self.bid,
        )
    }
}

/// A queue met its high-water mark and the producer was paused.
///
/// # Log Level
/// `warn` - Backpressure engaged
///
/// # Example
/// ```
/// use the_relay::observability::messages::queue::ProducerPaused;
///
/// let msg = ProducerPaused {
///     worker_id: "uploader",
///     queue: "resize",
///     depth: 100,
///     high_water_mark: 100,
/// };
///
/// assert_eq!(msg.to_string(), "Queue 'resize' at 100/100, pausing producer");
/// ```
pub struct ProducerPaused<'a> {
    pub worker_id: &'a str,
    pub queue: &'a str,
    pub depth: usize,
    pub high_water_mark: usize,
}

impl Display for ProducerPaused<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Queue '{}' at {}/{}, pausing producer",
            self.queue, self.depth, self.high_water_mark
        )
    }
}

impl StructuredLog for ProducerPaused<'_> {
    fn log(&self) {
        tracing::warn!(
            worker_id = self.worker_id,
            queue = self.queue,
            depth = self.depth,
            high_water_mark = self.high_water_mark,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "producer_paused",
            span_name = name,
            worker_id = self.worker_id,
            queue = self.queue,
        )
    }
}

/// Paused producers were resumed.
///
/// # Log Level
/// `info` - Backpressure released
pub struct ProducersResumed<'a> {
    pub worker_id: &'a str,
    pub count: usize,
}

impl Display for ProducersResumed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Resumed {} paused producer(s)", self.count)
    }
}

impl StructuredLog for ProducersResumed<'_> {
    fn log(&self) {
        tracing::info!(worker_id = self.worker_id, count = self.count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("producers_resumed", span_name = name, worker_id = self.worker_id)
    }
}

/// A handler popped a task and is feeding it to its pipeline.
///
/// # Log Level
/// `debug` - Queue traffic
pub struct TaskTaken<'a> {
    pub worker_id: &'a str,
    pub queue: &'a str,
    pub bid: Option<&'a str>,
}

impl Display for TaskTaken<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Took task {} from '{}'", self.bid.unwrap_or("-"), self.queue)
    }
}

impl StructuredLog for TaskTaken<'_> {
    fn log(&self) {
        tracing::debug!(worker_id = self.worker_id, queue = self.queue, bid = self.bid, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "task",
            span_name = name,
            worker_id = self.worker_id,
            queue = self.queue,
            bid = self.bid,
        )
    }
}

/// A handler found its queue empty.
///
/// # Log Level
/// `debug` - Diagnostic detail
pub struct QueueDrained<'a> {
    pub worker_id: &'a str,
    pub queue: &'a str,
}

impl Display for QueueDrained<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Queue '{}' drained, waiting for the next publish", self.queue)
    }
}

impl StructuredLog for QueueDrained<'_> {
    fn log(&self) {
        tracing::debug!(worker_id = self.worker_id, queue = self.queue, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("drained", span_name = name, worker_id = self.worker_id)
    }
}

/// A popped task or a stored result could not be decoded, or the broker
/// failed outside of any pipeline.
///
/// # Log Level
/// `error` - Failure requiring attention
pub struct QueueFailure<'a> {
    pub worker_id: &'a str,
    pub operation: &'a str,
    pub error: &'a WorkerError,
}

impl Display for QueueFailure<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Queue {} failed: {}", self.operation, self.error)
    }
}

impl StructuredLog for QueueFailure<'_> {
    fn log(&self) {
        tracing::error!(
            worker_id = self.worker_id,
            operation = self.operation,
            code = self.error.code(),
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "queue_failure",
            span_name = name,
            worker_id = self.worker_id,
            operation = self.operation,
        )
    }
}

/// A result was stored and announced.
///
/// # Log Level
/// `debug` - Queue traffic
pub struct ResultPublished<'a> {
    pub worker_id: &'a str,
    pub id: &'a str,
    pub channel: &'a str,
    pub last: bool,
}

impl Display for ResultPublished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Published result {} on '{}' (final: {})", self.id, self.channel, self.last)
    }
}

impl StructuredLog for ResultPublished<'_> {
    fn log(&self) {
        tracing::debug!(
            worker_id = self.worker_id,
            id = self.id,
            channel = self.channel,
            last = self.last,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("result_published", span_name = name, id = self.id)
    }
}

/// An originating queuer collected one of its results.
///
/// # Log Level
/// `debug` - Queue traffic
pub struct ResultCollected<'a> {
    pub worker_id: &'a str,
    pub id: &'a str,
    pub released: bool,
}

impl Display for ResultCollected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.released {
            write!(f, "Collected result {}, origin released", self.id)
        } else {
            write!(f, "Collected result {}", self.id)
        }
    }
}

impl StructuredLog for ResultCollected<'_> {
    fn log(&self) {
        tracing::debug!(
            worker_id = self.worker_id,
            id = self.id,
            released = self.released,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("result_collected", span_name = name, id = self.id)
    }
}

/// A broker listener started.
///
/// # Log Level
/// `info` - Lifecycle
pub struct ListenerStarted<'a> {
    pub worker_id: &'a str,
    pub channel: &'a str,
}

impl Display for ListenerStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Listening on '{}'", self.channel)
    }
}

impl StructuredLog for ListenerStarted<'_> {
    fn log(&self) {
        tracing::info!(worker_id = self.worker_id, channel = self.channel, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "listener",
            span_name = name,
            worker_id = self.worker_id,
            channel = self.channel,
        )
    }
}

/// A broker listener stopped.
///
/// # Log Level
/// `info` - Lifecycle
pub struct ListenerStopped<'a> {
    pub worker_id: &'a str,
    pub channel: &'a str,
}

impl Display for ListenerStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stopped listening on '{}'", self.channel)
    }
}

impl StructuredLog for ListenerStopped<'_> {
    fn log(&self) {
        tracing::info!(worker_id = self.worker_id, channel = self.channel, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("listener_stopped", span_name = name, worker_id = self.worker_id)
    }
}

/// Result finalization is counted on a cache other processes cannot see.
///
/// # Log Level
/// `warn` - Logged once per queuer
pub struct FinalizationNotShared<'a> {
    pub worker_id: &'a str,
    pub cache: &'a str,
}

impl Display for FinalizationNotShared<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Counting final results on process-local cache '{}'; completions reported by other processes will not be seen",
            self.cache
        )
    }
}

impl StructuredLog for FinalizationNotShared<'_> {
    fn log(&self) {
        tracing::warn!(worker_id = self.worker_id, cache = self.cache, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("finalization", span_name = name, worker_id = self.worker_id)
    }
}
