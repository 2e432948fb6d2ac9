// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # bfjit-engine
//!
//! A compiler and runtime for the eight-instruction tape language.
//!
//! ## Overview
//!
//! This crate provides:
//! - A bytecode compiler with run-length folding and loop pairing
//! - A reference interpreter over a fixed-size byte tape
//! - A just-in-time compiler emitting x86-64 machine code
//!
//! Both execution paths share the tape size, the bounds policy and the host
//! I/O routines, so a program writes the same bytes whichever path runs it.
//!
//! ## Quick Start
//!
//! ```rust
//! use bfjit_engine::{Engine, EngineConfig, ExecutionMode};
//!
//! let config = EngineConfig::default().with_mode(ExecutionMode::Interpret);
//! let engine = Engine::new(config)?;
//!
//! let mut out = Vec::new();
//! engine.run("++++++++[>++++++++<-]>+.", &b""[..], &mut out)?;
//! assert_eq!(out, b"A");
//! # Ok::<(), bfjit_engine::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod host;
pub mod jit;
pub mod vm;

pub use compiler::{OpCode, Program, compile};
pub use config::{EngineConfig, ExecutionMode};
pub use error::{Error, Result};
pub use host::EOF_SENTINEL;
pub use jit::Jit;
pub use vm::{DEFAULT_TAPE_LEN, Interpreter, Tape};

use std::io::{Read, Write};

use tracing::info;

use crate::jit::X86_64Backend;

/// Executes programs on the path chosen by its [`EngineConfig`].
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    runner: Runner,
}

#[derive(Debug)]
enum Runner {
    Interpret(Interpreter),
    Jit(Jit),
}

impl Engine {
    /// Creates an engine from a validated configuration.
    ///
    /// In [`ExecutionMode::Jit`] this fails with [`Error::UnsupportedTarget`]
    /// on hosts without a native backend.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let runner = match config.mode {
            ExecutionMode::Interpret => Runner::Interpret(Interpreter::new(config.tape_len)),
            ExecutionMode::Jit => Runner::Jit(Jit::new(config.tape_len)?),
        };
        Ok(Self { config, runner })
    }

    /// The configuration this engine was built from.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compiles source text into bytecode.
    pub fn compile(&self, source: &str) -> Result<Program> {
        compile(source)
    }

    /// Compiles and runs `source`, returning the final tape.
    ///
    /// Compile errors are reported before anything is read or written.
    pub fn run<R: Read, W: Write>(&self, source: &str, input: R, output: W) -> Result<Tape> {
        let program = self.compile(source)?;
        info!(
            mode = %self.config.mode,
            opcodes = program.len(),
            tape_len = self.config.tape_len,
            "running program"
        );
        self.execute(&program, input, output)
    }

    /// Runs an already compiled program.
    pub fn execute<R: Read, W: Write>(
        &self,
        program: &Program,
        input: R,
        output: W,
    ) -> Result<Tape> {
        match &self.runner {
            Runner::Interpret(interpreter) => interpreter.run(program, input, output),
            Runner::Jit(jit) => jit.run(program, input, output),
        }
    }

    /// Machine code the JIT would run for `source`, with a null context.
    ///
    /// Works on any host and in either mode, since nothing is executed.
    pub fn emit_native(&self, source: &str) -> Result<Vec<u8>> {
        let program = self.compile(source)?;
        match &self.runner {
            Runner::Jit(jit) => jit.emit(&program),
            Runner::Interpret(_) => {
                Jit::with_backend(Box::new(X86_64Backend), self.config.tape_len)?.emit(&program)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreting(tape_len: usize) -> Engine {
        Engine::new(
            EngineConfig::default()
                .with_tape_len(tape_len)
                .with_mode(ExecutionMode::Interpret),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = Engine::new(EngineConfig::default().with_tape_len(0));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_interpreted_run() {
        let engine = interpreting(8);
        let mut out = Vec::new();
        let tape = engine.run("+++[>++<-]>.", &b""[..], &mut out).unwrap();
        assert_eq!(out, [6]);
        assert_eq!(tape.cells()[1], 6);
        assert_eq!(engine.config().mode, ExecutionMode::Interpret);
    }

    #[test]
    fn test_compile_error_writes_nothing() {
        let engine = interpreting(8);
        let mut out = Vec::new();
        let err = engine.run("+.[", &b""[..], &mut out).unwrap_err();
        assert!(err.is_compile_error());
        assert!(out.is_empty());
    }

    #[test]
    fn test_emit_native_in_interpret_mode() {
        let engine = interpreting(8);
        let code = engine.emit_native("+").unwrap();
        assert_eq!(code.first(), Some(&0x41));
        assert_eq!(code.last(), Some(&0xC3));
    }

    #[test]
    #[cfg(all(target_arch = "x86_64", unix))]
    fn test_default_engine_uses_jit() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let mut out = Vec::new();
        engine.run("+++[>++<-]>.", &b""[..], &mut out).unwrap();
        assert_eq!(out, [6]);
    }

    #[test]
    #[cfg(not(all(target_arch = "x86_64", unix)))]
    fn test_default_engine_unsupported() {
        assert!(matches!(
            Engine::new(EngineConfig::default()),
            Err(Error::UnsupportedTarget(_))
        ));
    }
}
