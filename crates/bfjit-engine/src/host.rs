// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Byte-at-a-time host I/O shared by both execution paths.

use std::io::{self, ErrorKind, Read, Write};

/// Value stored in a cell when input is exhausted.
///
/// This is the end-of-stream signal (-1) read back as an unsigned byte.
pub const EOF_SENTINEL: u8 = 0xFF;

/// Reads one byte for an input instruction.
///
/// Pending output is flushed first so prompts show up before the program
/// blocks.
pub fn read_cell(input: &mut dyn Read, output: &mut dyn Write) -> io::Result<u8> {
    output.flush()?;
    let mut buf = [0u8; 1];
    loop {
        match input.read(&mut buf) {
            Ok(0) => return Ok(EOF_SENTINEL),
            Ok(_) => return Ok(buf[0]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Writes one byte for an output instruction.
#[inline]
pub fn write_cell(output: &mut dyn Write, byte: u8) -> io::Result<()> {
    output.write_all(&[byte])
}
