// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Number of random bytes behind a task or stream id.
pub const TOKEN_BYTES: usize = 32;

/// Mints a 256-bit random token rendered as lowercase hex.
pub fn random_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}
