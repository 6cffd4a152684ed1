// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Errors that can occur during pipeline configuration validation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The forward links (downstream, bypass, branches) form a cycle
    CyclicLink {
        /// The cycle path showing the circular link
        cycle: Vec<String>,
    },
    /// A worker references another worker that doesn't exist
    UnresolvedReference {
        /// The worker holding the reference
        worker_id: String,
        /// Which link the reference was found in
        link: &'static str,
        /// The id that couldn't be resolved
        missing: String,
    },
    /// A worker has a duplicate ID
    DuplicateWorkerId {
        /// The duplicate worker ID
        worker_id: String,
    },
    /// A resolver has no fan-out (slicer, broadcaster or queuer) sharing its name
    UnpairedResolver {
        /// The resolver's id
        worker_id: String,
        /// The barrier name it waits on
        name: String,
    },
    /// A worker's options contradict its kind
    InvalidOptions {
        /// The offending worker
        worker_id: String,
        /// Human-readable reason
        reason: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::CyclicLink { cycle } => {
                write!(f, "Cyclic link detected: {}", cycle.join(" -> "))
            }
            ValidationError::UnresolvedReference {
                worker_id,
                link,
                missing,
            } => {
                write!(
                    f,
                    "Worker '{}' links {} to '{}' which does not exist",
                    worker_id, link, missing
                )
            }
            ValidationError::DuplicateWorkerId { worker_id } => {
                write!(f, "Duplicate worker ID: '{}'", worker_id)
            }
            ValidationError::UnpairedResolver { worker_id, name } => {
                write!(
                    f,
                    "Resolver '{}' waits on '{}' but no slicer, broadcaster or queuer uses that name",
                    worker_id, name
                )
            }
            ValidationError::InvalidOptions { worker_id, reason } => {
                write!(f, "Worker '{}' has invalid options: {}", worker_id, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}
