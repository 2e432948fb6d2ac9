// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Stack of open loops.
//!
//! Used by the bytecode compiler for opcode indices and by the native
//! emitters for patch sites. Every input element can push at most one
//! entry, so the stack is sized once from the input length.

use crate::error::{Error, Result};

/// A stack of pending loop openers.
#[derive(Debug, Clone)]
pub struct LoopStack<T> {
    entries: Vec<T>,
}

impl<T: Copy> LoopStack<T> {
    /// Creates a stack that can hold `bound` entries without reallocating.
    pub fn with_bound(bound: usize) -> Self {
        Self {
            entries: Vec::with_capacity(bound),
        }
    }

    /// Pushes an open loop.
    pub fn push(&mut self, entry: T) {
        self.entries.push(entry);
    }

    /// Pops the innermost open loop.
    ///
    /// An empty stack means a closer without an opener; `offset` locates it
    /// in the error.
    pub fn pop(&mut self, offset: usize) -> Result<T> {
        self.entries
            .pop()
            .ok_or_else(|| Error::unmatched_close(offset))
    }

    /// Innermost open loop, if any.
    pub fn peek(&self) -> Option<T> {
        self.entries.last().copied()
    }

    /// Number of loops still open.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Whether every loop has been closed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
