// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;

use crate::config::consts::{CONTENT_TYPE_JSON, CONTENT_TYPE_YAML};
use crate::errors::WorkerError;
use crate::traits::{Codec, CodecOptions};

fn codec_error(content_type: &str, err: impl ToString) -> WorkerError {
    WorkerError::Codec {
        content_type: content_type.to_string(),
        message: err.to_string(),
    }
}

/// `application/json`, the wire default of the Queuer.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

#[async_trait]
impl Codec for JsonCodec {
    fn content_type(&self) -> &str {
        CONTENT_TYPE_JSON
    }

    async fn parse(&self, bytes: &[u8], _options: &CodecOptions) -> Result<Value, WorkerError> {
        serde_json::from_slice(bytes).map_err(|e| codec_error(CONTENT_TYPE_JSON, e))
    }

    async fn stringify(&self, value: &Value, options: &CodecOptions) -> Result<Vec<u8>, WorkerError> {
        let encoded = if options.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        encoded.map_err(|e| codec_error(CONTENT_TYPE_JSON, e))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct YamlCodec;

#[async_trait]
impl Codec for YamlCodec {
    fn content_type(&self) -> &str {
        CONTENT_TYPE_YAML
    }

    async fn parse(&self, bytes: &[u8], _options: &CodecOptions) -> Result<Value, WorkerError> {
        serde_yaml::from_slice(bytes).map_err(|e| codec_error(CONTENT_TYPE_YAML, e))
    }

    async fn stringify(&self, value: &Value, _options: &CodecOptions) -> Result<Vec<u8>, WorkerError> {
        serde_yaml::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| codec_error(CONTENT_TYPE_YAML, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn json_codec_encodes_compact_and_pretty() {
        let codec = JsonCodec;
        let value = json!({"queue": "q", "n": [1, 2]});

        let compact = codec.stringify(&value, &CodecOptions::default()).await.unwrap();
        assert!(!compact.contains(&b'\n'));
        let pretty = codec
            .stringify(&value, &CodecOptions { pretty: true })
            .await
            .unwrap();
        assert!(pretty.contains(&b'\n'));

        assert_eq!(codec.parse(&compact, &CodecOptions::default()).await.unwrap(), value);
    }

    #[tokio::test]
    async fn parse_failures_name_the_content_type() {
        let error = JsonCodec
            .parse(b"{not json", &CodecOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, WorkerError::Codec { ref content_type, .. } if content_type == CONTENT_TYPE_JSON));
        assert_eq!(error.code(), 500);
    }

    #[tokio::test]
    async fn yaml_codec_reads_yaml() {
        let value = YamlCodec
            .parse(b"queue: q\nresult: none\n", &CodecOptions::default())
            .await
            .unwrap();
        assert_eq!(value, json!({"queue": "q", "result": "none"}));
    }
}
