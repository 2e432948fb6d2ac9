// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Engine configuration.

use std::fmt;

use crate::error::{Error, Result};
use crate::vm::DEFAULT_TAPE_LEN;

/// Largest tape the native code can address with 32-bit displacements.
pub const MAX_TAPE_LEN: usize = i32::MAX as usize;

/// Which path runs a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Reference interpreter
    Interpret,
    /// Native code through the host backend
    #[default]
    Jit,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Interpret => write!(f, "interpret"),
            ExecutionMode::Jit => write!(f, "jit"),
        }
    }
}

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Cells allocated per run
    pub tape_len: usize,

    /// Execution path
    pub mode: ExecutionMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tape_len: DEFAULT_TAPE_LEN,
            mode: ExecutionMode::default(),
        }
    }
}

impl EngineConfig {
    /// Sets the tape length.
    pub fn with_tape_len(mut self, tape_len: usize) -> Self {
        self.tape_len = tape_len;
        self
    }

    /// Sets the execution path.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Checks the configuration before any engine is built from it.
    pub fn validate(&self) -> Result<()> {
        validate_tape_len(self.tape_len)
    }
}

pub(crate) fn validate_tape_len(tape_len: usize) -> Result<()> {
    if tape_len == 0 {
        return Err(Error::InvalidConfig("tape must have at least one cell".into()));
    }
    if tape_len > MAX_TAPE_LEN {
        return Err(Error::InvalidConfig(format!(
            "tape of {tape_len} cells exceeds the limit of {MAX_TAPE_LEN}"
        )));
    }
    Ok(())
}
