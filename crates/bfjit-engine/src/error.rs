// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the engine

use std::fmt;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compiling or executing a program
#[derive(Debug, Error)]
pub enum Error {
    /// A loop bracket has no partner
    #[error("unbalanced loop: {fault} at offset {offset}")]
    UnbalancedLoop {
        /// Byte offset in the source, or opcode index when raised by a backend
        offset: usize,
        /// Which side of the pair is missing
        fault: LoopFault,
    },

    /// The data cursor was moved off the tape
    #[error("memory out of bounds: cursor moved to cell {offset} on a tape of {tape_len} cells")]
    MemoryOutOfBounds {
        /// Cell index the cursor would have reached
        offset: i64,
        /// Length of the tape
        tape_len: usize,
    },

    /// Executable memory could not be mapped or protected
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// Rejected engine configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No native backend exists for the host
    #[error("native compilation is not supported on {0}")]
    UnsupportedTarget(&'static str),

    /// Host input or output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an unmatched `]` error
    pub fn unmatched_close(offset: usize) -> Self {
        Self::UnbalancedLoop {
            offset,
            fault: LoopFault::UnmatchedClose,
        }
    }

    /// Create an unclosed `[` error
    pub fn unclosed_open(offset: usize) -> Self {
        Self::UnbalancedLoop {
            offset,
            fault: LoopFault::UnclosedOpen,
        }
    }

    /// Create an out-of-bounds error
    pub fn out_of_bounds(offset: i64, tape_len: usize) -> Self {
        Self::MemoryOutOfBounds { offset, tape_len }
    }

    /// Whether this error was raised before anything ran
    pub fn is_compile_error(&self) -> bool {
        matches!(self, Self::UnbalancedLoop { .. })
    }
}

/// The two ways a loop can be unbalanced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopFault {
    /// A `]` with no open loop
    UnmatchedClose,
    /// A `[` still open at the end of the source
    UnclosedOpen,
}

impl fmt::Display for LoopFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopFault::UnmatchedClose => write!(f, "unmatched ']'"),
            LoopFault::UnclosedOpen => write!(f, "unclosed '['"),
        }
    }
}
