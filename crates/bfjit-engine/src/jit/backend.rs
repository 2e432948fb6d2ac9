// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Native target backends.

use std::fmt;

use crate::compiler::Program;
use crate::error::{Error, Result};
use crate::jit::intrinsics::Intrinsics;
use crate::jit::x86_64::X86_64Backend;

/// Everything a backend needs to know about the host before emitting.
#[derive(Debug, Clone, Copy)]
pub struct NativeEnv {
    /// Host routines and their context
    pub intrinsics: Intrinsics,
    /// Cells in the tape the routine will be handed
    pub tape_len: usize,
}

/// A code generator for one instruction set and calling convention.
///
/// The emitted routine takes the tape address as its only argument and
/// returns nothing. It reports cursor faults through
/// [`Intrinsic::BoundsFault`] before returning early, and returns early as
/// soon as an I/O intrinsic reports a failed stream.
///
/// [`Intrinsic::BoundsFault`]: crate::jit::Intrinsic::BoundsFault
pub trait Backend: fmt::Debug {
    /// Short target name, e.g. `x86_64-sysv`.
    fn name(&self) -> &'static str;

    /// Whether code from this backend can run on the current host.
    fn is_native(&self) -> bool;

    /// Translates `program` into machine code.
    fn emit(&self, program: &Program, env: &NativeEnv) -> Result<Vec<u8>>;
}

/// Returns the backend for the host this process runs on.
pub fn host_backend() -> Result<Box<dyn Backend>> {
    let backend = X86_64Backend;
    if backend.is_native() {
        Ok(Box::new(backend))
    } else {
        Err(Error::UnsupportedTarget(std::env::consts::ARCH))
    }
}
