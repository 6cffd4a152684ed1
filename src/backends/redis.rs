// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Redis broker and cache, behind the `redis` feature.
//!
//! Batches go through `MULTI`/`EXEC` pipelines on a shared
//! `ConnectionManager`. Each subscription opens its own pub/sub connection,
//! forwarded into a [`Subscription`] by a background task that ends when the
//! subscription is dropped.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::errors::WorkerError;
use crate::traits::{Broker, BrokerOp, BrokerReply, Cache, Subscription};

fn broker_error(err: redis::RedisError) -> WorkerError {
    WorkerError::Broker(err.to_string())
}

fn cache_error(err: impl ToString) -> WorkerError {
    WorkerError::Cache(err.to_string())
}

async fn connect(url: &str) -> redis::RedisResult<(redis::Client, ConnectionManager)> {
    let client = redis::Client::open(url)?;
    let manager = ConnectionManager::new(client.clone()).await?;
    Ok((client, manager))
}

fn reply_for(op: &BrokerOp, value: redis::Value) -> Result<BrokerReply, WorkerError> {
    match (op, value) {
        (BrokerOp::RPop { .. } | BrokerOp::Get { .. }, redis::Value::Nil) => Ok(BrokerReply::Bytes(None)),
        (BrokerOp::RPop { .. } | BrokerOp::Get { .. }, redis::Value::Data(bytes)) => {
            Ok(BrokerReply::Bytes(Some(bytes)))
        }
        (_, redis::Value::Int(n)) => Ok(BrokerReply::Int(n)),
        (_, redis::Value::Okay) | (_, redis::Value::Status(_)) => Ok(BrokerReply::Ok),
        (op, other) => Err(WorkerError::Broker(format!(
            "unexpected reply {:?} to {:?}",
            other, op
        ))),
    }
}

pub struct RedisBroker {
    client: redis::Client,
    manager: ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(url: &str) -> Result<Self, WorkerError> {
        let (client, manager) = connect(url).await.map_err(broker_error)?;
        Ok(Self { client, manager })
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn exec(&self, ops: Vec<BrokerOp>) -> Result<Vec<BrokerReply>, WorkerError> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &ops {
            match op {
                BrokerOp::LPush { key, value } => {
                    pipe.cmd("LPUSH").arg(key).arg(value.as_slice());
                }
                BrokerOp::RPop { key } => {
                    pipe.cmd("RPOP").arg(key);
                }
                BrokerOp::LLen { key } => {
                    pipe.cmd("LLEN").arg(key);
                }
                BrokerOp::Get { key } => {
                    pipe.cmd("GET").arg(key);
                }
                BrokerOp::Set { key, value, ttl } => {
                    pipe.cmd("SET").arg(key).arg(value.as_slice());
                    if let Some(ttl) = ttl {
                        pipe.arg("PX").arg(ttl.as_millis() as u64);
                    }
                }
                BrokerOp::Del { key } => {
                    pipe.cmd("DEL").arg(key);
                }
                BrokerOp::PExpire { key, ttl } => {
                    pipe.cmd("PEXPIRE").arg(key).arg(ttl.as_millis() as u64);
                }
                BrokerOp::Publish { channel, message } => {
                    pipe.cmd("PUBLISH").arg(channel).arg(message.as_slice());
                }
            }
        }

        let mut conn = self.manager.clone();
        let values: Vec<redis::Value> = pipe.query_async(&mut conn).await.map_err(broker_error)?;
        if values.len() != ops.len() {
            return Err(WorkerError::Broker(format!(
                "expected {} replies, got {}",
                ops.len(),
                values.len()
            )));
        }
        ops.iter().zip(values).map(|(op, value)| reply_for(op, value)).collect()
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, WorkerError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(broker_error)?;
        pubsub.subscribe(channel).await.map_err(broker_error)?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while let Some(message) = messages.next().await {
                let Ok(payload) = message.get_payload::<Vec<u8>>() else {
                    continue;
                };
                if tx.send(payload).is_err() {
                    break;
                }
            }
        });
        Ok(Subscription::new(channel, rx))
    }

    async fn subscribers(&self, channel: &str) -> Result<usize, WorkerError> {
        let mut conn = self.manager.clone();
        let (_, count): (String, usize) = redis::cmd("PUBSUB")
            .arg("NUMSUB")
            .arg(channel)
            .query_async(&mut conn)
            .await
            .map_err(broker_error)?;
        Ok(count)
    }
}

/// Cache shared by every process pointed at the same Redis. Values are
/// stored as JSON text.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, WorkerError> {
        let (_, manager) = connect(url).await.map_err(cache_error)?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, WorkerError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        raw.map(|text| serde_json::from_str(&text).map_err(cache_error))
            .transpose()
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), WorkerError> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value.to_string());
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis() as u64);
        }
        cmd.query_async::<_, ()>(&mut conn).await.map_err(cache_error)
    }

    async fn increment(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64, WorkerError> {
        let mut conn = self.manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("INCRBY").arg(key).arg(delta);
        if let Some(ttl) = ttl {
            pipe.cmd("PEXPIRE").arg(key).arg(ttl.as_millis() as u64).ignore();
        }
        let (value,): (i64,) = pipe.query_async(&mut conn).await.map_err(cache_error)?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool, WorkerError> {
        let mut conn = self.manager.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(removed > 0)
    }

    fn is_shared(&self) -> bool {
        true
    }
}
