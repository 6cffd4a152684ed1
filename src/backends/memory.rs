// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-process broker with Redis semantics.
//!
//! Lists, expiring keys and pub/sub channels live behind one mutex, so an
//! `exec` batch is applied atomically. Key expiry is checked lazily against
//! the injected [`Clock`], which lets tests expire results by advancing a
//! `ManualClock` instead of sleeping.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use crate::errors::WorkerError;
use crate::traits::{Broker, BrokerOp, BrokerReply, Subscription};
use crate::utils::{Clock, SystemClock};

#[derive(Default)]
struct State {
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    keys: HashMap<String, (Vec<u8>, Option<u64>)>,
    channels: HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>,
    fail_next: Option<String>,
}

impl State {
    fn live_key(&mut self, key: &str, now: u64) -> Option<&mut (Vec<u8>, Option<u64>)> {
        if self
            .keys
            .get(key)
            .is_some_and(|(_, at)| at.is_some_and(|at| at <= now))
        {
            self.keys.remove(key);
        }
        self.keys.get_mut(key)
    }

    fn subscribers(&mut self, channel: &str) -> usize {
        match self.channels.get_mut(channel) {
            Some(senders) => {
                senders.retain(|s| !s.is_closed());
                senders.len()
            }
            None => 0,
        }
    }

    fn apply(&mut self, op: BrokerOp, now: u64) -> BrokerReply {
        match op {
            BrokerOp::LPush { key, value } => {
                let list = self.lists.entry(key).or_default();
                list.push_front(value);
                BrokerReply::Int(list.len() as i64)
            }
            BrokerOp::RPop { key } => {
                let popped = self.lists.get_mut(&key).and_then(VecDeque::pop_back);
                if self.lists.get(&key).is_some_and(VecDeque::is_empty) {
                    self.lists.remove(&key);
                }
                BrokerReply::Bytes(popped)
            }
            BrokerOp::LLen { key } => BrokerReply::Int(self.lists.get(&key).map_or(0, VecDeque::len) as i64),
            BrokerOp::Get { key } => BrokerReply::Bytes(self.live_key(&key, now).map(|(v, _)| v.clone())),
            BrokerOp::Set { key, value, ttl } => {
                let deadline = ttl.map(|ttl| now + ttl.as_millis() as u64);
                self.keys.insert(key, (value, deadline));
                BrokerReply::Ok
            }
            BrokerOp::Del { key } => {
                let existed = self.live_key(&key, now).is_some();
                self.keys.remove(&key);
                BrokerReply::Int(existed as i64)
            }
            BrokerOp::PExpire { key, ttl } => match self.live_key(&key, now) {
                Some(entry) => {
                    entry.1 = Some(now + ttl.as_millis() as u64);
                    BrokerReply::Int(1)
                }
                None => BrokerReply::Int(0),
            },
            BrokerOp::Publish { channel, message } => {
                let delivered = match self.channels.get_mut(&channel) {
                    Some(senders) => {
                        senders.retain(|s| s.send(message.clone()).is_ok());
                        senders.len()
                    }
                    None => 0,
                };
                BrokerReply::Int(delivered as i64)
            }
        }
    }
}

fn is_write(op: &BrokerOp) -> bool {
    !matches!(op, BrokerOp::LLen { .. } | BrokerOp::Get { .. })
}

pub struct MemoryBroker {
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    writes: AtomicUsize,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryBroker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(State::default()),
            writes: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of mutating operations applied so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn queue_len(&self, key: &str) -> usize {
        self.state().lists.get(key).map_or(0, VecDeque::len)
    }

    pub fn has_key(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.state().live_key(key, now).is_some()
    }

    /// Makes the next `exec` fail with a broker error without applying it.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state().fail_next = Some(message.into());
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn exec(&self, ops: Vec<BrokerOp>) -> Result<Vec<BrokerReply>, WorkerError> {
        let now = self.clock.now_ms();
        let mut state = self.state();
        if let Some(message) = state.fail_next.take() {
            return Err(WorkerError::Broker(message));
        }
        let writes = ops.iter().filter(|op| is_write(op)).count();
        let replies: Vec<BrokerReply> = ops.into_iter().map(|op| state.apply(op, now)).collect();
        self.writes.fetch_add(writes, Ordering::SeqCst);
        Ok(replies)
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, WorkerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().channels.entry(channel.to_string()).or_default().push(tx);
        Ok(Subscription::new(channel, rx))
    }

    async fn subscribers(&self, channel: &str) -> Result<usize, WorkerError> {
        Ok(self.state().subscribers(channel))
    }
}
