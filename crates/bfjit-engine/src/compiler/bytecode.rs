// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode definitions.

use std::fmt;

/// A compiled program.
///
/// Only the compiler builds programs, so every loop opener points at its
/// closer and back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// The instructions
    instructions: Vec<OpCode>,
}

impl Program {
    /// Creates an empty program able to hold `capacity` opcodes without growing.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            instructions: Vec::with_capacity(capacity),
        }
    }

    /// Adds an instruction and returns its index.
    pub(crate) fn emit(&mut self, opcode: OpCode) -> usize {
        let index = self.instructions.len();
        self.instructions.push(opcode);
        index
    }

    /// Points the loop opener at `index` to `target`.
    pub(crate) fn resolve_open(&mut self, index: usize, target: usize) {
        if let Some(OpCode::JumpIfZero(slot)) = self.instructions.get_mut(index) {
            *slot = target;
        }
    }

    /// The instructions, in execution order.
    pub fn instructions(&self) -> &[OpCode] {
        &self.instructions
    }

    /// Number of opcodes.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the program has no opcodes.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the opcode at `index`.
    pub fn get(&self, index: usize) -> Option<&OpCode> {
        self.instructions.get(index)
    }

    /// Iterates over the opcodes.
    pub fn iter(&self) -> std::slice::Iter<'_, OpCode> {
        self.instructions.iter()
    }

    /// Number of loops in the program.
    pub fn loop_count(&self) -> usize {
        self.instructions
            .iter()
            .filter(|op| matches!(op, OpCode::JumpIfZero(_)))
            .count()
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a OpCode;
    type IntoIter = std::slice::Iter<'a, OpCode>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, opcode) in self.instructions.iter().enumerate() {
            writeln!(f, "{index:>6}  {opcode}")?;
        }
        Ok(())
    }
}

/// Operation codes.
///
/// Run-length kinds carry their repeat count (always at least 1), jump
/// kinds carry the index of their partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Move the cursor right
    MoveRight(u32),
    /// Move the cursor left
    MoveLeft(u32),
    /// Add to the current cell, wrapping
    Add(u32),
    /// Subtract from the current cell, wrapping
    Sub(u32),
    /// Write the current cell to the output
    Output(u32),
    /// Read a byte into the current cell
    Input(u32),
    /// Jump past the matching closer when the cell is zero
    JumpIfZero(usize),
    /// Jump back to the matching opener when the cell is non-zero
    JumpIfNotZero(usize),
}

impl OpCode {
    /// Builds the run-length opcode for a source byte, if it is one.
    pub fn folded(byte: u8, count: u32) -> Option<Self> {
        let opcode = match byte {
            b'>' => Self::MoveRight(count),
            b'<' => Self::MoveLeft(count),
            b'+' => Self::Add(count),
            b'-' => Self::Sub(count),
            b'.' => Self::Output(count),
            b',' => Self::Input(count),
            _ => return None,
        };
        Some(opcode)
    }

    /// The source character this opcode was built from.
    pub fn symbol(&self) -> char {
        match self {
            Self::MoveRight(_) => '>',
            Self::MoveLeft(_) => '<',
            Self::Add(_) => '+',
            Self::Sub(_) => '-',
            Self::Output(_) => '.',
            Self::Input(_) => ',',
            Self::JumpIfZero(_) => '[',
            Self::JumpIfNotZero(_) => ']',
        }
    }

    /// Repeat count, `None` for jumps.
    pub fn count(&self) -> Option<u32> {
        match *self {
            Self::MoveRight(n)
            | Self::MoveLeft(n)
            | Self::Add(n)
            | Self::Sub(n)
            | Self::Output(n)
            | Self::Input(n) => Some(n),
            Self::JumpIfZero(_) | Self::JumpIfNotZero(_) => None,
        }
    }

    /// Jump target, `None` for run-length kinds.
    pub fn target(&self) -> Option<usize> {
        match *self {
            Self::JumpIfZero(t) | Self::JumpIfNotZero(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.count(), self.target()) {
            (Some(n), _) => write!(f, "{} x{}", self.symbol(), n),
            (_, Some(t)) => write!(f, "{} -> {}", self.symbol(), t),
            _ => write!(f, "{}", self.symbol()),
        }
    }
}
