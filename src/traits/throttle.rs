// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Producer-side flow control handle.
///
/// A producer that feeds a pipeline registers one of these on the box under
/// the queue name it writes to; the Queuer pauses it when the broker queue is
/// saturated and resumes it once results start draining.
pub trait Throttle: Send + Sync {
    fn pause(&self);

    fn resume(&self);

    fn is_paused(&self) -> bool;
}
