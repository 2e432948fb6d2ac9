// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Just-in-time compilation to native code.
//!
//! ## Structure
//!
//! - `backend` - The `Backend` trait and host backend selection
//! - `x86_64` - x86-64 System V encoder with loop backpatching
//! - `intrinsics` - Host routines called from native code
//! - `memory` - Executable memory mapping and the native call
//!
//! A run resolves the intrinsics against a fresh host context, emits code,
//! maps it, calls it once with a fresh tape and unmaps it again.

pub mod backend;
pub mod intrinsics;
pub mod memory;
pub mod x86_64;

pub use backend::{Backend, NativeEnv, host_backend};
pub use intrinsics::{Intrinsic, Intrinsics};
pub use memory::ExecutableBuffer;
pub use x86_64::X86_64Backend;

use std::io::{Read, Write};

use tracing::debug;

use crate::compiler::Program;
use crate::config::validate_tape_len;
use crate::error::{Error, Result};
use crate::jit::intrinsics::HostContext;
use crate::vm::{DEFAULT_TAPE_LEN, Tape};

/// Compiles programs to native code and runs them.
#[derive(Debug)]
pub struct Jit {
    backend: Box<dyn Backend>,
    /// Cells allocated per run
    tape_len: usize,
}

impl Jit {
    /// Creates a JIT for the host, with runs using `tape_len` cells.
    ///
    /// Fails with [`Error::UnsupportedTarget`]
    /// when no backend can run on this host.
    pub fn new(tape_len: usize) -> Result<Self> {
        Self::with_backend(host_backend()?, tape_len)
    }

    /// Creates a JIT around a specific backend.
    ///
    /// The backend need not match the host as long as only [`emit`](Self::emit)
    /// is used.
    pub fn with_backend(backend: Box<dyn Backend>, tape_len: usize) -> Result<Self> {
        validate_tape_len(tape_len)?;
        Ok(Self { backend, tape_len })
    }

    /// Name of the backend in use.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Cells allocated per run.
    pub fn tape_len(&self) -> usize {
        self.tape_len
    }

    /// Emits code for `program` against unbound intrinsics.
    ///
    /// The result shows exactly what a run would execute, except that the
    /// context immediate is zero. It is meant for dumps, not for calling.
    pub fn emit(&self, program: &Program) -> Result<Vec<u8>> {
        let env = NativeEnv {
            intrinsics: Intrinsics::unbound(),
            tape_len: self.tape_len,
        };
        self.backend.emit(program, &env)
    }

    /// Compiles `program`, runs it once and returns the final tape.
    ///
    /// Output written before a bounds fault or I/O error stays written; the
    /// fault is reported after the native routine returns.
    pub fn run<R: Read, W: Write>(
        &self,
        program: &Program,
        mut input: R,
        mut output: W,
    ) -> Result<Tape> {
        if !self.backend.is_native() {
            return Err(Error::UnsupportedTarget(self.backend.name()));
        }

        let mut context = HostContext::new(&mut input, &mut output);
        let env = NativeEnv {
            intrinsics: Intrinsics::bind(&mut context),
            tape_len: self.tape_len,
        };

        let code = self.backend.emit(program, &env)?;
        let buffer = ExecutableBuffer::from_code(&code)?;
        debug!(
            backend = self.backend.name(),
            code_len = buffer.code_len(),
            region_len = buffer.region_len(),
            "invoking native code"
        );

        let mut tape = Tape::new(self.tape_len);
        // SAFETY: the code was emitted by a native backend for a tape of
        // `self.tape_len` cells, and `context` is alive and untouched until
        // the call returns.
        unsafe { buffer.invoke(&mut tape) };
        drop(buffer);

        context.finish(self.tape_len)?;
        Ok(tape)
    }
}

impl Default for Jit {
    /// The x86-64 backend with the default tape, whether or not it can run here.
    fn default() -> Self {
        Self {
            backend: Box::new(X86_64Backend),
            tape_len: DEFAULT_TAPE_LEN,
        }
    }
}
