// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! This module provides centralized message types for all diagnostic and operational
//! logging throughout The Relay. Message types follow a struct-based pattern
//! with `Display` trait implementation to:
//!
//! * Eliminate magic strings scattered throughout the codebase
//! * Keep field names consistent between the human-readable line and the structured fields
//! * Let per-worker loggers render the same message that `tracing` records
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::worker` - pipeline hops, fan-out and fan-in
//! * `messages::queue` - distributed queue traffic, backpressure and listeners
//! * `messages::validation` - configuration validation errors
//!
//! # Usage
//!
//! ```rust
//! use the_relay::observability::messages::worker::ErrorDropped;
//! use the_relay::errors::WorkerError;
//!
//! let error = WorkerError::application("boom");
//! let msg = ErrorDropped {
//!     worker_id: "sink",
//!     error: &error,
//! };
//!
//! tracing::warn!("{}", msg);
//! ```

pub mod messages;
