// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The cell tape shared by the interpreter and native code.

use std::fmt::Write as _;

use crate::error::{Error, Result};

/// Number of cells on a tape unless configured otherwise.
pub const DEFAULT_TAPE_LEN: usize = 30_000;

/// A fixed-length, zero-initialized array of byte cells.
///
/// The cursor lives with whoever drives the tape. Moves are checked here so
/// that the interpreter and native code fail at the same point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: Vec<u8>,
}

impl Tape {
    /// Creates a zeroed tape of `len` cells.
    pub fn new(len: usize) -> Self {
        Self {
            cells: vec![0; len],
        }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the tape has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cells.
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// The cells, mutably.
    pub fn cells_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }

    /// Address of the first cell, for native code.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.cells.as_mut_ptr()
    }

    /// Moves `cursor` right by `n` cells.
    #[inline]
    pub fn move_right(&self, cursor: usize, n: u32) -> Result<usize> {
        let target = cursor as i64 + i64::from(n);
        if target >= self.cells.len() as i64 {
            return Err(Error::out_of_bounds(target, self.cells.len()));
        }
        Ok(target as usize)
    }

    /// Moves `cursor` left by `n` cells.
    #[inline]
    pub fn move_left(&self, cursor: usize, n: u32) -> Result<usize> {
        let target = cursor as i64 - i64::from(n);
        if target < 0 {
            return Err(Error::out_of_bounds(target, self.cells.len()));
        }
        Ok(target as usize)
    }

    /// Hex dump of the first `n` cells, sixteen per line.
    pub fn hex_dump(&self, n: usize) -> String {
        let mut out = String::from("CELL DUMP:\n");
        for (i, cell) in self.cells.iter().take(n).enumerate() {
            let _ = write!(out, "[{cell:02X}] ");
            if i % 16 == 15 {
                out.push('\n');
            }
        }
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

impl Default for Tape {
    fn default() -> Self {
        Self::new(DEFAULT_TAPE_LEN)
    }
}
