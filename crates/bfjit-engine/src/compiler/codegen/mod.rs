// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Code generation from source text to bytecode.
//!
//! This module contains the `Compiler`, which scans the source once from left
//! to right. Runs of identical instructions fold into a single opcode with a
//! repeat count, and loop brackets are paired through a `LoopStack` so that
//! both ends of every loop know the index of the other.


use tracing::debug;

use crate::compiler::bytecode::{OpCode, Program};
use crate::compiler::stack::LoopStack;
use crate::error::{Error, Result};

/// Compiles source text to bytecode.
#[derive(Debug)]
pub struct Compiler {
    /// The program being generated
    program: Program,
    /// Open loops as (opcode index, source offset)
    loops: LoopStack<(usize, usize)>,
}

impl Compiler {
    /// Creates a new compiler.
    pub fn new() -> Self {
        Self {
            program: Program::default(),
            loops: LoopStack::with_bound(0),
        }
    }

    /// Compiles a program to bytecode.
    ///
    /// Fails with [`Error::UnbalancedLoop`] on a `]` that closes nothing or
    /// a `[` that is never closed. Nothing is returned on failure.
    pub fn compile(&mut self, source: &str) -> Result<Program> {
        let bytes = source.as_bytes();
        self.program = Program::with_capacity(bytes.len());
        self.loops = LoopStack::with_bound(bytes.len());

        let mut pos = 0;
        while pos < bytes.len() {
            match bytes[pos] {
                b'[' => {
                    let index = self.program.emit(OpCode::JumpIfZero(0));
                    self.loops.push((index, pos));
                    pos += 1;
                }
                b']' => {
                    let (open, _) = self.loops.pop(pos)?;
                    let close = self.program.emit(OpCode::JumpIfNotZero(open));
                    self.program.resolve_open(open, close);
                    pos += 1;
                }
                byte => pos = self.compile_run(bytes, pos, byte),
            }
        }

        if let Some((_, offset)) = self.loops.peek() {
            return Err(Error::unclosed_open(offset));
        }

        let program = std::mem::take(&mut self.program);
        debug!(
            source_len = bytes.len(),
            opcodes = program.len(),
            loops = program.loop_count(),
            "compiled program"
        );
        Ok(program)
    }

    /// Folds the run of `byte` starting at `start` and returns the position
    /// after it. Comment bytes advance by one and emit nothing.
    fn compile_run(&mut self, bytes: &[u8], start: usize, byte: u8) -> usize {
        if OpCode::folded(byte, 1).is_none() {
            return start + 1;
        }

        let end = bytes[start..]
            .iter()
            .position(|&b| b != byte)
            .map_or(bytes.len(), |len| start + len);

        let mut remaining = end - start;
        while remaining > 0 {
            let chunk = remaining.min(u32::MAX as usize);
            if let Some(opcode) = OpCode::folded(byte, chunk as u32) {
                self.program.emit(opcode);
            }
            remaining -= chunk;
        }
        end
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
