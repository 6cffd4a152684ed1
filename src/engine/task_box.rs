// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The per-operation correlation context threaded through a pipeline.
//!
//! A [`TaskBox`] is created at ingress and shared by reference ([`BoxRef`])
//! with every worker the operation visits. It carries the correlation ids and
//! the fan-out/fan-in barriers that Slicers, Broadcasters and Queuers open and
//! Resolvers close.
//!
//! All mutation happens under the box's own mutex, and no method holds that
//! lock across an `.await`: a caller gets back a [`Settled`] describing what
//! to do next and acts on it after the lock is released.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use crate::engine::envelope::BoxIds;
use crate::engine::Payload;
use crate::errors::WorkerError;
use crate::traits::Throttle;
use crate::utils::random_token;

pub type BoxRef = Arc<TaskBox>;

/// Completion of one fan-in branch.
pub type Outcome = Result<Payload, WorkerError>;

/// Single-shot completion hook of a callback barrier.
pub type ResolveCallback = Box<dyn FnOnce(Outcome) -> BoxFuture<'static, ()> + Send>;

/// Fan-in bookkeeping for one fan-out, keyed on the box by worker name.
pub enum Barrier {
    /// First completion wins and is handed to `callback`.
    Callback { data: Value, callback: ResolveCallback },
    /// Completes every `total` completions.
    Count {
        data: Value,
        total: usize,
        count: usize,
        collect: Vec<Option<Value>>,
        error: Option<WorkerError>,
    },
}

impl Barrier {
    pub fn count(data: Value, total: usize) -> Self {
        Barrier::Count {
            data,
            total,
            count: 0,
            collect: Vec::with_capacity(total),
            error: None,
        }
    }

    pub fn callback<F, Fut>(data: Value, callback: F) -> Self
    where
        F: FnOnce(Outcome) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Barrier::Callback {
            data,
            callback: Box::new(move |outcome| Box::pin(callback(outcome))),
        }
    }

    pub fn total(&self) -> usize {
        match self {
            Barrier::Callback { .. } => 1,
            Barrier::Count { total, .. } => *total,
        }
    }

    fn is_callback(&self) -> bool {
        matches!(self, Barrier::Callback { .. })
    }
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Barrier::Callback { data, .. } => f
                .debug_struct("Callback")
                .field("data", data)
                .finish_non_exhaustive(),
            Barrier::Count {
                total,
                count,
                collect,
                error,
                ..
            } => f
                .debug_struct("Count")
                .field("total", total)
                .field("count", count)
                .field("collected", &collect.iter().filter(|v| v.is_some()).count())
                .field("error", error)
                .finish(),
        }
    }
}

/// What a Resolver must do after settling one completion.
pub enum Settled {
    /// No barrier under that name.
    Missing,
    /// Barrier is still waiting on other branches.
    Pending,
    /// Callback barrier fired; invoke the callback with the outcome.
    Callback(ResolveCallback, Outcome),
    /// Count barrier completed a wave and was torn down.
    Complete(Outcome),
}

#[derive(Default)]
struct BoxState {
    bid: Option<String>,
    rid: Option<String>,
    sid: Option<String>,
    resolve: HashMap<String, Barrier>,
    throttle: HashMap<String, Arc<dyn Throttle>>,
}

#[derive(Default)]
pub struct TaskBox {
    state: Mutex<BoxState>,
}

impl TaskBox {
    pub fn new() -> BoxRef {
        Arc::new(TaskBox::default())
    }

    /// A box carrying a request id for log correlation.
    pub fn with_rid(rid: impl Into<String>) -> BoxRef {
        let bx = TaskBox::default();
        bx.state().rid = Some(rid.into());
        Arc::new(bx)
    }

    /// Rebuilds a box on the consuming side of the queue.
    pub fn restore(ids: BoxIds) -> BoxRef {
        let bx = TaskBox::default();
        {
            let mut state = bx.state();
            state.bid = ids.bid;
            state.rid = ids.rid;
            state.sid = ids.sid;
        }
        Arc::new(bx)
    }

    fn state(&self) -> MutexGuard<'_, BoxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ids(&self) -> BoxIds {
        let state = self.state();
        BoxIds {
            bid: state.bid.clone(),
            rid: state.rid.clone(),
            sid: state.sid.clone(),
        }
    }

    pub fn bid(&self) -> Option<String> {
        self.state().bid.clone()
    }

    pub fn rid(&self) -> Option<String> {
        self.state().rid.clone()
    }

    pub fn sid(&self) -> Option<String> {
        self.state().sid.clone()
    }

    pub fn set_sid(&self, sid: impl Into<String>) {
        self.state().sid = Some(sid.into());
    }

    /// Task id, minted the first time the box crosses a process boundary.
    pub fn ensure_bid(&self) -> String {
        self.state().bid.get_or_insert_with(random_token).clone()
    }

    /// Stream id, minted the first time a streamed task is pushed.
    pub fn ensure_sid(&self) -> String {
        self.state().sid.get_or_insert_with(random_token).clone()
    }

    /// Opens a barrier under `name`. A second barrier under the same name
    /// before the first is torn down is rejected.
    pub fn set_up_resolve(&self, name: &str, barrier: Barrier) -> Result<(), WorkerError> {
        let mut state = self.state();
        if state.resolve.contains_key(name) {
            return Err(WorkerError::DuplicateResolve {
                name: name.to_string(),
            });
        }
        state.resolve.insert(name.to_string(), barrier);
        Ok(())
    }

    pub fn has_resolve(&self, name: &str) -> bool {
        self.state().resolve.contains_key(name)
    }

    pub fn tear_down_resolve(&self, name: &str) -> Option<Barrier> {
        self.state().resolve.remove(name)
    }

    /// Installs a callback barrier whose completion arrives on the returned
    /// channel. Handy for drivers waiting on a request/response round trip.
    pub fn await_resolve(&self, name: &str, data: Value) -> Result<oneshot::Receiver<Outcome>, WorkerError> {
        let (tx, rx) = oneshot::channel();
        self.set_up_resolve(
            name,
            Barrier::callback(data, move |outcome| async move {
                let _ = tx.send(outcome);
            }),
        )?;
        Ok(rx)
    }

    /// Records one completion against the barrier under `name`.
    ///
    /// Callback barriers are torn down on the first completion. Count
    /// barriers store successful values at their stamped index (or append
    /// when unstamped) if `collect` is set, remember the first error, and tear
    /// down once `count` reaches a multiple of `total`. An index at or past
    /// `total` counts as a 400 error instead of growing the collection.
    pub fn settle(&self, name: &str, outcome: Outcome, collect: bool) -> Settled {
        let mut state = self.state();

        let is_callback = match state.resolve.get(name) {
            Some(barrier) => barrier.is_callback(),
            None => return Settled::Missing,
        };

        if is_callback {
            return match state.resolve.remove(name) {
                Some(Barrier::Callback { callback, .. }) => Settled::Callback(callback, outcome),
                _ => Settled::Missing,
            };
        }

        let complete = match state.resolve.get_mut(name) {
            Some(Barrier::Count {
                total,
                count,
                collect: slots,
                error,
                ..
            }) => {
                *count += 1;
                match outcome {
                    Ok(payload) if collect => {
                        let at = payload.index.unwrap_or(slots.len());
                        if at < *total {
                            if at >= slots.len() {
                                slots.resize(at + 1, None);
                            }
                            slots[at] = Some(payload.value);
                        } else {
                            error.get_or_insert(WorkerError::BadRequest(format!(
                                "index {} outside a fan-out of {}",
                                at, total
                            )));
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error.get_or_insert(e);
                    }
                }
                *total == 0 || *count % *total == 0
            }
            _ => return Settled::Missing,
        };

        if !complete {
            return Settled::Pending;
        }

        match state.resolve.remove(name) {
            Some(Barrier::Count {
                data,
                collect: slots,
                error,
                ..
            }) => match error {
                Some(e) => Settled::Complete(Err(e)),
                None if collect => Settled::Complete(Ok(Payload::new(Value::Array(
                    slots.into_iter().map(|v| v.unwrap_or(Value::Null)).collect(),
                )))),
                None => Settled::Complete(Ok(Payload::new(data))),
            },
            _ => Settled::Missing,
        }
    }

    /// Registers the producer handle to pause when `queue` saturates.
    pub fn set_throttle(&self, queue: &str, handle: Arc<dyn Throttle>) {
        self.state().throttle.insert(queue.to_string(), handle);
    }

    pub fn throttle(&self, queue: &str) -> Option<Arc<dyn Throttle>> {
        self.state().throttle.get(queue).cloned()
    }
}

impl fmt::Debug for TaskBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("TaskBox")
            .field("bid", &state.bid)
            .field("rid", &state.rid)
            .field("sid", &state.sid)
            .field("resolve", &state.resolve)
            .field("throttle", &state.throttle.keys().collect::<Vec<_>>())
            .finish()
    }
}
