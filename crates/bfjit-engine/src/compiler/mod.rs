// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode compiler.
//!
//! Transforms source text into bytecode that can be executed by the VM or
//! handed to a native backend.
//!
//! # Module Structure
//!
//! - `bytecode`: Opcode and program definitions
//! - `codegen`: Source scanning, run-length folding and loop pairing
//! - `stack`: The open-loop stack shared with the native emitters

pub mod bytecode;
pub mod codegen;
pub mod stack;

pub use bytecode::{OpCode, Program};
pub use codegen::Compiler;
pub use stack::LoopStack;

use crate::error::Result;

/// Compiles source text with a fresh [`Compiler`].
pub fn compile(source: &str) -> Result<Program> {
    Compiler::new().compile(source)
}
