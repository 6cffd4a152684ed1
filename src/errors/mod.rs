// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod runtime;
mod worker;

pub use config::ValidationError;
pub use runtime::ConfigError;
pub use worker::{transform_error, WireError, WorkerError};
