// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Content type used by the Queuer when none is configured
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// Content type of the YAML codec
pub const CONTENT_TYPE_YAML: &str = "application/yaml";

/// Default number of tasks a handler Queuer processes at once
pub const DEFAULT_CONCURRENCY: usize = 1;
/// Default broker queue depth at which producers are paused
pub const DEFAULT_HIGH_WATER_MARK: usize = 100;
/// Default lifetime of an unread result (5 minutes)
pub const DEFAULT_EXPIRE_MS: u64 = 300_000;

/// Registry name of the default in-memory cache
pub const DEFAULT_CACHE: &str = "memory";
/// Registry name of the default logger
pub const DEFAULT_LOGGER: &str = "default";

/// Broker channel announcing `result: return` completions
pub const RETURN_CHANNEL: &str = "return";
/// Broker channel announcing `result: stream` parts
pub const STREAM_CHANNEL: &str = "stream";
