// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pattern-routed logger on top of `tracing`.
//!
//! Each level carries an ordered list of worker id patterns. `*` matches any
//! run of characters and a leading `!` turns a pattern into an exclusion; the
//! last matching pattern decides. With the default routes every level except
//! `debug` is on for every worker.

use std::collections::HashMap;
use std::fmt::Display;

use crate::traits::{LogLevel, Logger};

#[derive(Debug, Clone, PartialEq)]
struct Pattern {
    negate: bool,
    glob: String,
}

impl Pattern {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix('!') {
            Some(glob) => Pattern {
                negate: true,
                glob: glob.to_string(),
            },
            None => Pattern {
                negate: false,
                glob: raw.to_string(),
            },
        }
    }
}

/// Glob match supporting only `*`.
fn matches(glob: &str, text: &str) -> bool {
    let mut parts = glob.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // No wildcard at all
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[derive(Debug, Clone)]
pub struct TracingLogger {
    routes: HashMap<LogLevel, Vec<Pattern>>,
}

impl Default for TracingLogger {
    fn default() -> Self {
        let mut logger = TracingLogger::silent();
        for level in LogLevel::ALL {
            if level != LogLevel::Debug {
                logger = logger.route(level, &["*"]);
            }
        }
        logger
    }
}

impl TracingLogger {
    /// A logger with every level off.
    pub fn silent() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Replaces the patterns of one level.
    pub fn route<S: AsRef<str>>(mut self, level: LogLevel, patterns: &[S]) -> Self {
        self.routes
            .insert(level, patterns.iter().map(|p| Pattern::parse(p.as_ref())).collect());
        self
    }

    /// Default routes with the given levels replaced.
    pub fn with_routes(routes: &HashMap<LogLevel, Vec<String>>) -> Self {
        routes
            .iter()
            .fold(TracingLogger::default(), |logger, (level, patterns)| logger.route(*level, patterns))
    }
}

impl Logger for TracingLogger {
    fn enabled(&self, worker_id: &str, level: LogLevel) -> bool {
        self.routes
            .get(&level)
            .map(|patterns| {
                patterns
                    .iter()
                    .filter(|p| matches(&p.glob, worker_id))
                    .last()
                    .is_some_and(|p| !p.negate)
            })
            .unwrap_or(false)
    }

    fn log(&self, worker_id: &str, level: LogLevel, message: &dyn Display, correlation_id: Option<&str>) {
        emit(worker_id, level, message, correlation_id);
    }
}

/// Emits one worker log line through `tracing`. `pass` traffic is recorded
/// at debug and `fail` traffic at warn.
pub fn emit(worker_id: &str, level: LogLevel, message: &dyn Display, correlation_id: Option<&str>) {
    let level_name = level.as_str();
    match level {
        LogLevel::Debug | LogLevel::Pass => {
            tracing::debug!(worker_id, level = level_name, correlation_id, "{}", message)
        }
        LogLevel::Info => tracing::info!(worker_id, level = level_name, correlation_id, "{}", message),
        LogLevel::Fail | LogLevel::Warn => {
            tracing::warn!(worker_id, level = level_name, correlation_id, "{}", message)
        }
        LogLevel::Error => tracing::error!(worker_id, level = level_name, correlation_id, "{}", message),
    }
}
