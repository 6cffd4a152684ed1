// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::WorkerError;

/// Per-call encoding options.
#[derive(Debug, Clone, Default)]
pub struct CodecOptions {
    /// Human-readable output where the format supports it
    pub pretty: bool,
}

/// Content encoder/decoder registered under its content type.
#[async_trait]
pub trait Codec: Send + Sync {
    fn content_type(&self) -> &str;

    async fn parse(&self, bytes: &[u8], options: &CodecOptions) -> Result<Value, WorkerError>;

    async fn stringify(&self, value: &Value, options: &CodecOptions) -> Result<Vec<u8>, WorkerError>;
}
