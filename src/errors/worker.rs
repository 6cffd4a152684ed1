// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors that travel through a pipeline.
//!
//! Every variant carries a numeric class (`code()`), rendered as the prefix of
//! its message (`"400 ..."`, `"404 ..."`) so terminal error sinks can classify
//! failures coarsely. Errors crossing the distributed queue are flattened into
//! [`WireError`] and rebuilt on the other side with [`transform_error`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error flowing through the `err` side of a pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkerError {
    /// Malformed task envelope or payload.
    #[error("400 {0}")]
    BadRequest(String),

    /// No live consumer for a queue, or an unregistered collaborator.
    #[error("404 {0}")]
    NotFound(String),

    /// A fan-out barrier was set up twice on the same in-flight box.
    #[error("409 duplicate fan-out '{name}' on an in-flight box")]
    DuplicateResolve { name: String },

    /// A live worker is already registered under this id.
    #[error("409 worker id '{id}' is already registered")]
    DuplicateWorker { id: String },

    /// A queued result expired before its originator read it.
    #[error("410 result '{id}' expired before it was collected")]
    ResultExpired { id: String },

    /// Content could not be encoded or decoded.
    #[error("500 codec {content_type}: {message}")]
    Codec {
        content_type: String,
        message: String,
    },

    /// Cache collaborator failure.
    #[error("500 cache: {0}")]
    Cache(String),

    /// Broker transport or transaction failure.
    #[error("502 broker: {0}")]
    Broker(String),

    /// Anything raised by application code inside an `act` override.
    #[error("{code} {message}")]
    Application {
        code: u16,
        kind: String,
        message: String,
    },
}

impl WorkerError {
    /// Shorthand for an application failure with a 500 class.
    pub fn application(message: impl Into<String>) -> Self {
        WorkerError::Application {
            code: 500,
            kind: "Error".to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            WorkerError::BadRequest(_) => 400,
            WorkerError::NotFound(_) => 404,
            WorkerError::DuplicateResolve { .. } | WorkerError::DuplicateWorker { .. } => 409,
            WorkerError::ResultExpired { .. } => 410,
            WorkerError::Codec { .. } | WorkerError::Cache(_) => 500,
            WorkerError::Broker(_) => 502,
            WorkerError::Application { code, .. } => *code,
        }
    }

    /// Stable type tag used by the wire form.
    pub fn kind(&self) -> &str {
        match self {
            WorkerError::BadRequest(_) => "BadRequest",
            WorkerError::NotFound(_) => "NotFound",
            WorkerError::DuplicateResolve { .. } => "DuplicateResolve",
            WorkerError::DuplicateWorker { .. } => "DuplicateWorker",
            WorkerError::ResultExpired { .. } => "ResultExpired",
            WorkerError::Codec { .. } => "Codec",
            WorkerError::Cache(_) => "Cache",
            WorkerError::Broker(_) => "Broker",
            WorkerError::Application { kind, .. } => kind,
        }
    }

    /// Message without the numeric class prefix.
    pub fn detail(&self) -> String {
        let rendered = self.to_string();
        match rendered.split_once(' ') {
            Some((prefix, rest)) if prefix.parse::<u16>().is_ok() => rest.to_string(),
            _ => rendered,
        }
    }

    pub fn to_wire(&self) -> WireError {
        WireError {
            code: self.code(),
            kind: self.kind().to_string(),
            message: self.detail(),
        }
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        WorkerError::Codec {
            content_type: crate::config::consts::CONTENT_TYPE_JSON.to_string(),
            message: err.to_string(),
        }
    }
}

/// Serializable `{code, type, message}` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    pub code: u16,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// Rebuilds a typed error from its wire form.
///
/// Variants whose payload is a plain message round-trip exactly; structured
/// variants and unknown types come back as [`WorkerError::Application`] with
/// the original code, type and message preserved.
pub fn transform_error(wire: WireError) -> WorkerError {
    match wire.kind.as_str() {
        "BadRequest" => WorkerError::BadRequest(wire.message),
        "NotFound" => WorkerError::NotFound(wire.message),
        "Cache" => WorkerError::Cache(strip_prefix(&wire.message, "cache: ")),
        "Broker" => WorkerError::Broker(strip_prefix(&wire.message, "broker: ")),
        _ => WorkerError::Application {
            code: wire.code,
            kind: wire.kind,
            message: wire.message,
        },
    }
}

fn strip_prefix(message: &str, prefix: &str) -> String {
    message.strip_prefix(prefix).unwrap_or(message).to_string()
}
