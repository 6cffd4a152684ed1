// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::traits::Throttle;

/// A producer-side [`Throttle`] an async producer can wait on.
///
/// ```ignore
/// let gate = FlowGate::new();
/// bx.set_throttle("resize", gate.clone());
/// loop {
///     gate.wait_open().await;
///     entry.call(&bx, next_item()).await;
/// }
/// ```
#[derive(Debug, Default)]
pub struct FlowGate {
    paused: AtomicBool,
    pauses: AtomicUsize,
    notify: Notify,
}

impl FlowGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// How many times the gate has been closed.
    pub fn pause_count(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    /// Resolves once the gate is open.
    pub async fn wait_open(&self) {
        loop {
            let notified = self.notify.notified();
            if !self.paused.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

impl Throttle for FlowGate {
    fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn waiters_release_on_resume() {
        let gate = FlowGate::new();
        gate.pause();
        gate.pause();
        assert_eq!(gate.pause_count(), 1);

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_open().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        gate.resume();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter released")
            .unwrap();
        assert!(!gate.is_paused());
    }
}
