// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host routines called from generated code.
//!
//! Native code reaches the host through three `extern "C"` functions whose
//! absolute addresses, together with a context pointer, are resolved into an
//! [`Intrinsics`] table before emission and baked into the code as 64-bit
//! immediates. None of these functions may unwind: failures are recorded in
//! the [`HostContext`] and reported once the native routine has returned.
//!
//! The I/O routines return a status in `eax`. A negative value means the
//! host stream failed and the routine must leave through its epilogue
//! without running another instruction.

use std::ffi::c_void;
use std::io::{self, Read, Write};

use crate::error::{Error, Result};
use crate::host::{EOF_SENTINEL, read_cell, write_cell};

/// Returned by the I/O intrinsics when the run must stop.
pub const IO_FAILED: i32 = -1;

type OutputFn = extern "C" fn(*mut c_void, u8) -> i32;
type InputFn = extern "C" fn(*mut c_void) -> i32;
type BoundsFaultFn = extern "C" fn(*mut c_void, isize);

/// A host routine native code can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    /// `output(ctx, byte) -> status`: write the current cell
    Output,
    /// `input(ctx) -> byte or status`: read into the current cell
    Input,
    /// `bounds_fault(ctx, offset)`: the cursor left the tape
    BoundsFault,
}

/// Resolved addresses of the host routines for one native run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intrinsics {
    context: u64,
    output: u64,
    input: u64,
    bounds_fault: u64,
}

impl Intrinsics {
    /// Binds the host routines to `context` for the duration of one run.
    pub(crate) fn bind(context: *mut HostContext<'_>) -> Self {
        Self {
            context: context as u64,
            ..Self::unbound()
        }
    }

    /// Host routines with a null context.
    ///
    /// Code emitted against this table is only fit for inspection: every
    /// intrinsic call is a no-op, inputs read as end of stream.
    pub fn unbound() -> Self {
        Self {
            context: 0,
            output: host_output as OutputFn as usize as u64,
            input: host_input as InputFn as usize as u64,
            bounds_fault: host_bounds_fault as BoundsFaultFn as usize as u64,
        }
    }

    /// Builds a table from raw addresses.
    #[cfg(test)]
    pub(crate) fn from_raw(context: u64, output: u64, input: u64, bounds_fault: u64) -> Self {
        Self {
            context,
            output,
            input,
            bounds_fault,
        }
    }

    /// Opaque pointer passed as the first argument of every intrinsic.
    pub fn context(&self) -> u64 {
        self.context
    }

    /// Entry address of `intrinsic`.
    pub fn address(&self, intrinsic: Intrinsic) -> u64 {
        match intrinsic {
            Intrinsic::Output => self.output,
            Intrinsic::Input => self.input,
            Intrinsic::BoundsFault => self.bounds_fault,
        }
    }
}

/// Host state reachable from native code during one run.
pub(crate) struct HostContext<'a> {
    input: &'a mut dyn Read,
    output: &'a mut dyn Write,
    error: Option<io::Error>,
    fault: Option<i64>,
}

impl<'a> HostContext<'a> {
    pub(crate) fn new(input: &'a mut dyn Read, output: &'a mut dyn Write) -> Self {
        Self {
            input,
            output,
            error: None,
            fault: None,
        }
    }

    /// Writes one byte; `false` once the output has failed.
    fn write(&mut self, byte: u8) -> bool {
        if self.error.is_some() {
            return false;
        }
        match write_cell(&mut *self.output, byte) {
            Ok(()) => true,
            Err(e) => {
                self.error = Some(e);
                false
            }
        }
    }

    /// Reads one byte; `None` once either stream has failed.
    fn read(&mut self) -> Option<u8> {
        if self.error.is_some() {
            return None;
        }
        match read_cell(&mut *self.input, &mut *self.output) {
            Ok(byte) => Some(byte),
            Err(e) => {
                self.error = Some(e);
                None
            }
        }
    }

    fn record_fault(&mut self, offset: i64) {
        self.fault.get_or_insert(offset);
    }

    /// Flushes the output, then reports what went wrong during the run.
    ///
    /// An I/O error recorded during the run wins over a failed flush.
    pub(crate) fn finish(mut self, tape_len: usize) -> Result<()> {
        let flushed = self.output.flush();
        if let Some(e) = self.error {
            return Err(Error::Io(e));
        }
        flushed?;
        match self.fault {
            Some(offset) => Err(Error::out_of_bounds(offset, tape_len)),
            None => Ok(()),
        }
    }
}

/// Resolves the context pointer handed to an intrinsic.
///
/// # Safety
///
/// `ctx` must be null or point to a live `HostContext` not otherwise
/// borrowed for the duration of the call.
unsafe fn context_mut<'c>(ctx: *mut c_void) -> Option<&'c mut HostContext<'c>> {
    // SAFETY: guaranteed by the caller.
    unsafe { ctx.cast::<HostContext<'c>>().as_mut() }
}

extern "C" fn host_output(ctx: *mut c_void, byte: u8) -> i32 {
    // SAFETY: native code passes the pointer bound into its Intrinsics
    // table; the run that bound it outlives the native call.
    match unsafe { context_mut(ctx) } {
        Some(ctx) => {
            if ctx.write(byte) {
                0
            } else {
                IO_FAILED
            }
        }
        None => 0,
    }
}

extern "C" fn host_input(ctx: *mut c_void) -> i32 {
    // SAFETY: see host_output.
    match unsafe { context_mut(ctx) } {
        Some(ctx) => ctx.read().map_or(IO_FAILED, i32::from),
        None => i32::from(EOF_SENTINEL),
    }
}

extern "C" fn host_bounds_fault(ctx: *mut c_void, offset: isize) {
    // SAFETY: see host_output.
    if let Some(ctx) = unsafe { context_mut(ctx) } {
        ctx.record_fault(offset as i64);
    }
}
