// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Wire formats of the distributed queue.
//!
//! A task travels as `{ "box": { bid, rid, sid }, "data": { ..., queue, result, index? } }`
//! and its result comes back as `{ "out": { data, error?, final }, queue, result, index? }`
//! stored under `"<bid|sid>:<index>"`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::consts::{RETURN_CHANNEL, STREAM_CHANNEL};
use crate::errors::{WireError, WorkerError};

/// Correlation ids of a box, the only part of it that crosses the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    #[serde(rename = "box")]
    pub ids: BoxIds,
    pub data: Value,
}

/// How the originator of a task wants to hear back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// Fire and forget.
    None,
    /// One result per task, keyed by `bid`.
    Return,
    /// Many results per task, keyed by `sid`.
    Stream,
}

impl ResultKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "none" => Some(ResultKind::None),
            "return" => Some(ResultKind::Return),
            "stream" => Some(ResultKind::Stream),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::None => "none",
            ResultKind::Return => RETURN_CHANNEL,
            ResultKind::Stream => STREAM_CHANNEL,
        }
    }

    /// Broker channel result notifications are published on.
    pub fn channel(&self) -> Option<&'static str> {
        match self {
            ResultKind::None => None,
            other => Some(other.as_str()),
        }
    }
}

/// Routing fields every queued task must carry.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub queue: String,
    pub result: ResultKind,
}

impl Route {
    /// Validates the routing fields of a task payload.
    pub fn from_data(data: &Value) -> Result<Route, WorkerError> {
        let object = data
            .as_object()
            .ok_or_else(|| WorkerError::BadRequest("task data must be an object".to_string()))?;

        let queue = object
            .get("queue")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkerError::BadRequest("task data is missing a string 'queue'".to_string()))?;

        let result = object
            .get("result")
            .and_then(Value::as_str)
            .and_then(ResultKind::parse)
            .ok_or_else(|| {
                WorkerError::BadRequest("task 'result' must be one of none, return, stream".to_string())
            })?;

        Ok(Route {
            queue: queue.to_string(),
            result,
        })
    }
}

/// Copies `data` with the positional stamp written into it.
pub fn stamp_index(data: &Value, index: Option<usize>) -> Value {
    match (data, index) {
        (Value::Object(map), Some(index)) => {
            let mut map = map.clone();
            map.insert("index".to_string(), Value::from(index));
            Value::Object(map)
        }
        _ => data.clone(),
    }
}

/// Reads the positional stamp back out of task data.
pub fn read_index(data: &Value) -> Option<usize> {
    data.get("index").and_then(Value::as_u64).map(|n| n as usize)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultOut {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
    #[serde(rename = "final", default)]
    pub last: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub out: ResultOut,
    pub queue: String,
    pub result: ResultKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

/// `"<key>:<index>"`, where key is the sid for streams and the bid otherwise.
pub fn result_id(key: &str, index: Option<usize>) -> String {
    format!("{}:{}", key, index.unwrap_or(0))
}

/// Splits a result id into its origin key and index.
pub fn parse_result_id(id: &str) -> Option<(&str, usize)> {
    let (key, index) = id.rsplit_once(':')?;
    Some((key, index.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn route_validation() {
        let cases = vec![
            (json!({"queue": "q", "result": "return"}), Ok(("q", ResultKind::Return))),
            (json!({"queue": "q", "result": "none", "x": 1}), Ok(("q", ResultKind::None))),
            (json!({"queue": "s", "result": "stream"}), Ok(("s", ResultKind::Stream))),
            (json!([1, 2]), Err(400)),
            (json!({"result": "return"}), Err(400)),
            (json!({"queue": 7, "result": "return"}), Err(400)),
            (json!({"queue": "q", "result": "later"}), Err(400)),
            (json!({"queue": "q"}), Err(400)),
        ];

        for (data, expected) in cases {
            let actual = Route::from_data(&data);
            match expected {
                Ok((queue, result)) => {
                    let route = actual.unwrap();
                    assert_eq!(route.queue, queue);
                    assert_eq!(route.result, result);
                }
                Err(code) => assert_eq!(actual.unwrap_err().code(), code, "data: {}", data),
            }
        }
    }

    #[test]
    fn task_envelope_uses_box_field() {
        let envelope = TaskEnvelope {
            ids: BoxIds {
                bid: Some("abc".into()),
                rid: None,
                sid: None,
            },
            data: json!({"queue": "q"}),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value, json!({"box": {"bid": "abc"}, "data": {"queue": "q"}}));
    }

    #[test]
    fn result_record_uses_final_field() {
        let record = ResultRecord {
            out: ResultOut {
                data: json!(1),
                error: None,
                last: true,
            },
            queue: "q".into(),
            result: ResultKind::Return,
            index: Some(2),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["out"]["final"], json!(true));
        assert_eq!(value["result"], json!("return"));
        assert!(value["out"].get("error").is_none());
    }

    #[test]
    fn result_ids_split_on_last_colon() {
        assert_eq!(result_id("abc", None), "abc:0");
        assert_eq!(parse_result_id("abc:3"), Some(("abc", 3)));
        assert_eq!(parse_result_id("a:b:12"), Some(("a:b", 12)));
        assert_eq!(parse_result_id("nocolon"), None);
        assert_eq!(parse_result_id("abc:x"), None);
    }

    #[test]
    fn index_stamp_only_touches_objects() {
        assert_eq!(stamp_index(&json!({"a": 1}), Some(4)), json!({"a": 1, "index": 4}));
        assert_eq!(stamp_index(&json!(5), Some(4)), json!(5));
        assert_eq!(read_index(&json!({"index": 4})), Some(4));
        assert_eq!(read_index(&json!({})), None);
    }
}
