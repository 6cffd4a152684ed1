// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Collaborator implementations for The Relay.
//!
//! Workers resolve their cache, codec and logger by name from a
//! [`Registry`](crate::engine::Registry); Queuers talk to a [`Broker`](crate::traits::Broker).
//! This module provides the implementations registered by default and the
//! ones selected through configuration.
//!
//! # Available Backends
//!
//! ## In-memory
//! - **MemoryBroker**: lists, expiring keys and pub/sub in one process, with
//!   atomic batches and an injectable clock
//! - **MemoryCache**: process-local key-value store with TTL
//! - **Use Case**: single-process pipelines, tests
//!
//! ## Redis (feature `redis`)
//! - **RedisBroker**: `MULTI`/`EXEC` pipelines and pub/sub over a Redis server
//! - **RedisCache**: shared cache, required for cross-process result finalization
//! - **Use Case**: distributed queues spanning several processes
//!
//! ## Codecs and logging
//! - **JsonCodec** / **YamlCodec**: registered under their content types
//! - **TracingLogger**: per-level worker id patterns on top of `tracing`
//! - **FlowGate**: awaitable producer throttle
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use the_relay::backends::MemoryBroker;
//! use the_relay::traits::Broker;
//! use the_relay::utils::ManualClock;
//!
//! # tokio_test_block(async {
//! let broker = MemoryBroker::new(Arc::new(ManualClock::new()));
//! broker.lpush("jobs", b"{}".to_vec()).await.unwrap();
//! assert_eq!(broker.llen("jobs").await.unwrap(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f);
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod gate;
pub mod logger;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use cache::MemoryCache;
pub use codec::{JsonCodec, YamlCodec};
pub use gate::FlowGate;
pub use logger::TracingLogger;
pub use memory::MemoryBroker;
#[cfg(feature = "redis")]
pub use self::redis::{RedisBroker, RedisCache};
