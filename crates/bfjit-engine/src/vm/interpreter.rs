// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bytecode interpreter.
//!
//! This is the reference semantics; the native backends must match it byte
//! for byte.

use std::io::{Read, Write};

use tracing::debug;

use crate::compiler::{OpCode, Program};
use crate::config::validate_tape_len;
use crate::error::Result;
use crate::host::{read_cell, write_cell};
use crate::vm::tape::{DEFAULT_TAPE_LEN, Tape};

/// Executes bytecode against a fresh tape.
#[derive(Debug, Clone)]
pub struct Interpreter {
    /// Cells allocated per run
    tape_len: usize,
}

impl Interpreter {
    /// Creates an interpreter whose runs use `tape_len` cells.
    pub fn new(tape_len: usize) -> Self {
        Self { tape_len }
    }

    /// Cells allocated per run.
    pub fn tape_len(&self) -> usize {
        self.tape_len
    }

    /// Runs `program` to completion and returns the final tape.
    ///
    /// Stops at the first cursor move off the tape or I/O failure; output
    /// written before that stays written.
    pub fn run<R: Read, W: Write>(
        &self,
        program: &Program,
        mut input: R,
        mut output: W,
    ) -> Result<Tape> {
        validate_tape_len(self.tape_len)?;
        let mut tape = Tape::new(self.tape_len);
        let result = Self::execute(program, &mut tape, &mut input, &mut output);
        let flushed = output.flush();
        let steps = result?;
        flushed?;
        debug!(steps, opcodes = program.len(), "interpreter finished");
        Ok(tape)
    }

    fn execute(
        program: &Program,
        tape: &mut Tape,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<u64> {
        let code = program.instructions();
        let mut ip = 0;
        let mut cursor = 0;
        let mut steps = 0u64;

        while ip < code.len() {
            match code[ip] {
                OpCode::MoveRight(n) => cursor = tape.move_right(cursor, n)?,
                OpCode::MoveLeft(n) => cursor = tape.move_left(cursor, n)?,
                OpCode::Add(n) => {
                    let cell = &mut tape.cells_mut()[cursor];
                    *cell = cell.wrapping_add(n as u8);
                }
                OpCode::Sub(n) => {
                    let cell = &mut tape.cells_mut()[cursor];
                    *cell = cell.wrapping_sub(n as u8);
                }
                OpCode::Output(n) => {
                    let byte = tape.cells()[cursor];
                    for _ in 0..n {
                        write_cell(output, byte)?;
                    }
                }
                OpCode::Input(n) => {
                    for _ in 0..n {
                        tape.cells_mut()[cursor] = read_cell(input, output)?;
                    }
                }
                OpCode::JumpIfZero(target) => {
                    if tape.cells()[cursor] == 0 {
                        ip = target;
                    }
                }
                OpCode::JumpIfNotZero(target) => {
                    if tape.cells()[cursor] != 0 {
                        ip = target;
                    }
                }
            }
            ip += 1;
            steps += 1;
        }

        Ok(steps)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(DEFAULT_TAPE_LEN)
    }
}
