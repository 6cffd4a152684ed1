// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for configuration loading and pipeline construction.

use super::{ValidationError, WorkerError};
use thiserror::Error;

/// Errors raised while turning a config file into a running pipeline
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration validation failed:\n{}", render(.0))]
    Invalid(Vec<ValidationError>),

    #[error("failed to build worker '{worker_id}': {source}")]
    Build {
        worker_id: String,
        #[source]
        source: WorkerError,
    },

    #[error("backend '{backend}' is not available: {reason}")]
    BackendUnavailable { backend: String, reason: String },
}

fn render(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
