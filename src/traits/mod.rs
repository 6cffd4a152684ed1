// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Seams of the runtime: node behaviour and the collaborators a worker
//! resolves by name (cache, codec, logger), plus the broker and throttle
//! contracts used by the Queuer.

pub mod broker;
pub mod cache;
pub mod codec;
pub mod logger;
pub mod logic;
pub mod throttle;

pub use broker::{Broker, BrokerOp, BrokerReply, Subscription};
pub use cache::Cache;
pub use codec::{Codec, CodecOptions};
pub use logger::{LogLevel, Logger};
pub use logic::{Stage, WorkerLogic};
pub use throttle::Throttle;
