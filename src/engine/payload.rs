// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;

/// The unit of data handed from worker to worker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    pub value: Value,
    /// Position stamped by a fan-out so a Resolver can reassemble in order.
    pub index: Option<usize>,
    /// Set on queued results: whether this is the last result for its task.
    pub last: Option<bool>,
}

impl Payload {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            index: None,
            last: None,
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// String field of an object payload.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.value.get(field).and_then(Value::as_str)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::new(value)
    }
}
