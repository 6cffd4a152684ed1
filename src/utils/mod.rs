// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod clock;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use token::random_token;
