// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fmt::{self, Display};

/// Log levels understood by worker loggers.
///
/// `Pass` and `Fail` mark the two directions of pipeline traffic; the others
/// follow their usual meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Pass,
    Fail,
    Warn,
    Error,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Pass,
        LogLevel::Fail,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Pass => "pass",
            LogLevel::Fail => "fail",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leveled logger with per-worker routing.
pub trait Logger: Send + Sync {
    /// Whether `level` is switched on for `worker_id`.
    fn enabled(&self, worker_id: &str, level: LogLevel) -> bool;

    /// Emits `message` for `worker_id`. `correlation_id` is the request id of
    /// the box being processed, when it has one.
    fn log(&self, worker_id: &str, level: LogLevel, message: &dyn Display, correlation_id: Option<&str>);
}
