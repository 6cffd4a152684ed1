// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for pipeline configuration validation.
//!
//! This module contains message types for logging events related to:
//! * Forward-link cycle detection
//! * Unresolved worker references
//! * Duplicate worker id detection
//! * Resolver pairing and option checks

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Cyclic forward links detected in configuration.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_relay::observability::messages::validation::CyclicLinkDetected;
///
/// let cycle = vec!["fetch".to_string(), "parse".to_string(), "fetch".to_string()];
/// let msg = CyclicLinkDetected { cycle: &cycle };
///
/// assert_eq!(msg.to_string(), "Cyclic link detected: fetch -> parse -> fetch");
/// ```
pub struct CyclicLinkDetected<'a> {
    pub cycle: &'a [String],
}

impl Display for CyclicLinkDetected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cyclic link detected: {}", self.cycle.join(" -> "))
    }
}

impl StructuredLog for CyclicLinkDetected<'_> {
    fn log(&self) {
        tracing::error!(
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
        )
    }
}

/// A link names a worker that is not configured.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_relay::observability::messages::validation::UnresolvedReference;
///
/// let msg = UnresolvedReference {
///     worker_id: "split",
///     link: "downstream",
///     missing: "dobule",
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct UnresolvedReference<'a> {
    pub worker_id: &'a str,
    pub link: &'a str,
    pub missing: &'a str,
}

impl Display for UnresolvedReference<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker '{}' links {} to missing worker '{}'",
            self.worker_id, self.link, self.missing
        )
    }
}

impl StructuredLog for UnresolvedReference<'_> {
    fn log(&self) {
        tracing::error!(
            worker_id = self.worker_id,
            link = self.link,
            missing = self.missing,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            worker_id = self.worker_id,
            link = self.link,
            missing = self.missing,
        )
    }
}

/// Duplicate worker id detected in configuration.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct DuplicateWorkerId<'a> {
    pub worker_id: &'a str,
}

impl Display for DuplicateWorkerId<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Duplicate worker ID: '{}'", self.worker_id)
    }
}

impl StructuredLog for DuplicateWorkerId<'_> {
    fn log(&self) {
        tracing::error!(worker_id = self.worker_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            worker_id = self.worker_id,
        )
    }
}

/// A worker is rejected for reasons local to its own entry: a resolver
/// without a fan-out partner, or options that contradict its kind.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_relay::observability::messages::validation::WorkerRejected;
///
/// let msg = WorkerRejected {
///     worker_id: "join",
///     reason: "no slicer, broadcaster or queuer is named 'split'",
/// };
///
/// assert_eq!(
///     msg.to_string(),
///     "Worker 'join' rejected: no slicer, broadcaster or queuer is named 'split'"
/// );
/// ```
pub struct WorkerRejected<'a> {
    pub worker_id: &'a str,
    pub reason: &'a str,
}

impl Display for WorkerRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker '{}' rejected: {}", self.worker_id, self.reason)
    }
}

impl StructuredLog for WorkerRejected<'_> {
    fn log(&self) {
        tracing::error!(worker_id = self.worker_id, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            worker_id = self.worker_id,
            reason = self.reason,
        )
    }
}

/// Configuration validation started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ValidationStarted {
    pub worker_count: usize,
}

impl Display for ValidationStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting pipeline validation for {} workers",
            self.worker_count
        )
    }
}

impl StructuredLog for ValidationStarted {
    fn log(&self) {
        tracing::info!(worker_count = self.worker_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::INFO,
            "span_name",
            name = name,
            worker_count = self.worker_count,
        )
    }
}

/// Configuration validation completed successfully.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ValidationCompleted {
    pub worker_count: usize,
}

impl Display for ValidationCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline validation completed successfully for {} workers",
            self.worker_count
        )
    }
}

impl StructuredLog for ValidationCompleted {
    fn log(&self) {
        tracing::info!(worker_count = self.worker_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::INFO,
            "span_name",
            name = name,
            worker_count = self.worker_count,
        )
    }
}

/// Configuration validation failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_relay::observability::messages::validation::ValidationFailed;
///
/// let msg = ValidationFailed { error_count: 3 };
///
/// tracing::error!("{}", msg);
/// ```
pub struct ValidationFailed {
    pub error_count: usize,
}

impl Display for ValidationFailed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline validation failed with {} errors",
            self.error_count
        )
    }
}

impl StructuredLog for ValidationFailed {
    fn log(&self) {
        tracing::error!(error_count = self.error_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            error_count = self.error_count,
        )
    }
}
