// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // broker, cache, codec and logger implementations
pub mod config;     // config loading, validation and pipeline building
pub mod engine;     // workers, barriers and the queue node
pub mod errors;     // error handling
pub mod observability;
pub mod traits;     // collaborator and node-behaviour seams
pub mod utils;      // clocks and ids
