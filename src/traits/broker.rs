// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Redis-shaped message broker contract.
//!
//! The Queuer needs three things from a broker: list queues (`lpush`/`rpop`/
//! `llen`), expiring keys (`get`/`set`/`del`/`pexpire`) and publish/subscribe.
//! Multi-step writes go through [`Broker::exec`], which applies a batch of
//! operations atomically (MULTI/EXEC).

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::errors::WorkerError;

/// One broker command inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerOp {
    LPush { key: String, value: Vec<u8> },
    RPop { key: String },
    LLen { key: String },
    Get { key: String },
    Set { key: String, value: Vec<u8>, ttl: Option<Duration> },
    Del { key: String },
    PExpire { key: String, ttl: Duration },
    Publish { channel: String, message: Vec<u8> },
}

/// Reply to a single [`BrokerOp`], in batch order.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerReply {
    Int(i64),
    Bytes(Option<Vec<u8>>),
    Ok,
}

impl BrokerReply {
    pub fn into_int(self) -> Result<i64, WorkerError> {
        match self {
            BrokerReply::Int(n) => Ok(n),
            other => Err(WorkerError::Broker(format!("expected integer reply, got {:?}", other))),
        }
    }

    pub fn into_bytes(self) -> Result<Option<Vec<u8>>, WorkerError> {
        match self {
            BrokerReply::Bytes(bytes) => Ok(bytes),
            other => Err(WorkerError::Broker(format!("expected bulk reply, got {:?}", other))),
        }
    }
}

/// A live channel subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Subscription {
    pub fn new(channel: impl Into<String>, receiver: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            channel: channel.into(),
            receiver,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next published message, or `None` once the broker side is gone.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.receiver.recv().await
    }
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Applies `ops` atomically and returns one reply per op.
    async fn exec(&self, ops: Vec<BrokerOp>) -> Result<Vec<BrokerReply>, WorkerError>;

    async fn subscribe(&self, channel: &str) -> Result<Subscription, WorkerError>;

    /// Number of live subscribers on `channel`.
    async fn subscribers(&self, channel: &str) -> Result<usize, WorkerError>;

    async fn lpush(&self, key: &str, value: Vec<u8>) -> Result<usize, WorkerError> {
        let reply = single(self.exec(vec![BrokerOp::LPush { key: key.to_string(), value }]).await?)?;
        Ok(reply.into_int()? as usize)
    }

    async fn rpop(&self, key: &str) -> Result<Option<Vec<u8>>, WorkerError> {
        single(self.exec(vec![BrokerOp::RPop { key: key.to_string() }]).await?)?.into_bytes()
    }

    async fn llen(&self, key: &str) -> Result<usize, WorkerError> {
        let reply = single(self.exec(vec![BrokerOp::LLen { key: key.to_string() }]).await?)?;
        Ok(reply.into_int()? as usize)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WorkerError> {
        single(self.exec(vec![BrokerOp::Get { key: key.to_string() }]).await?)?.into_bytes()
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), WorkerError> {
        self.exec(vec![BrokerOp::Set { key: key.to_string(), value, ttl }]).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, WorkerError> {
        let reply = single(self.exec(vec![BrokerOp::Del { key: key.to_string() }]).await?)?;
        Ok(reply.into_int()? > 0)
    }

    async fn pexpire(&self, key: &str, ttl: Duration) -> Result<bool, WorkerError> {
        let reply = single(self.exec(vec![BrokerOp::PExpire { key: key.to_string(), ttl }]).await?)?;
        Ok(reply.into_int()? > 0)
    }

    /// Returns the number of subscribers that received the message.
    async fn publish(&self, channel: &str, message: Vec<u8>) -> Result<usize, WorkerError> {
        let reply = single(
            self.exec(vec![BrokerOp::Publish { channel: channel.to_string(), message }]).await?,
        )?;
        Ok(reply.into_int()? as usize)
    }
}

fn single(mut replies: Vec<BrokerReply>) -> Result<BrokerReply, WorkerError> {
    replies
        .pop()
        .ok_or_else(|| WorkerError::Broker("empty reply to a single command".to_string()))
}
