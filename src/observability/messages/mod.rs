// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit itself through `tracing` with typed fields.
//!
//! * `worker` - pipeline hop events, routed through a worker's `Logger`
//! * `queue` - Queuer lifecycle and broker traffic
//! * `validation` - configuration validation errors
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_relay::observability::messages::queue::ListenerStarted;
//! use the_relay::observability::messages::StructuredLog;
//!
//! let msg = ListenerStarted {
//!     worker_id: "resize-handler",
//!     channel: "resize",
//! };
//!
//! msg.log();
//! ```

use tracing::Span;

pub mod queue;
pub mod validation;
pub mod worker;

/// A message that knows how to record itself with `tracing`.
pub trait StructuredLog {
    /// Emits the message at its natural level with structured fields.
    fn log(&self);

    /// A span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
