// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! x86-64 System V backend.
//!
//! The generated routine is `extern "C" fn(cells: *mut u8)`. Registers:
//!
//! | Register | Holds |
//! |----------|-------|
//! | `r12` | address of the first cell |
//! | `r13` | address of the current cell |
//! | `r14` | one past the last cell |
//!
//! All three are callee-saved, so they survive calls into the host. The
//! prologue pushes them, which also leaves `rsp` 16-byte aligned at every
//! call site.
//!
//! # Layout
//!
//! ```text
//! ┌──────────────┐
//! │ prologue     │  push r12/r13/r14, load base/cursor/end
//! │ body         │  one block per opcode
//! │ epilogue     │  pop r14/r13/r12, ret
//! │ fault stub   │  bounds_fault(ctx, r13 - r12), pop, ret
//! └──────────────┘
//! ```
//!
//! Every output and input call is followed by `test eax, eax; js` to the
//! epilogue, so a failed host stream ends the routine at once.
//!
//! Loops are emitted in one pass. A loop opener emits `jz rel32` with a zero
//! displacement and pushes the offset of that field; the matching closer
//! pops it, emits `jnz rel32` back to the loop body and rewrites the
//! opener's field to land just after itself.

use tracing::debug;

use crate::compiler::{LoopStack, OpCode, Program};
use crate::error::{Error, Result};
use crate::jit::backend::{Backend, NativeEnv};
use crate::jit::intrinsics::{Intrinsic, Intrinsics};

/// Bytes before the first opcode.
const PROLOGUE_LEN: usize = 22;
/// Bytes of `pop r14; pop r13; pop r12; ret`.
const EPILOGUE_LEN: usize = 7;
/// Bytes of the bounds-fault stub, epilogue included.
const FAULT_STUB_LEN: usize = 35;
/// Upper bound on the up-front reservation for the code buffer.
const MAX_RESERVE: usize = 64 << 20;

const RAX: u8 = 0;
const RDI: u8 = 7;

/// Condition codes for `0F 8x` near branches.
const CC_BELOW: u8 = 0x82;
const CC_SIGN: u8 = 0x88;
const CC_ABOVE_EQUAL: u8 = 0x83;
const CC_ZERO: u8 = 0x84;
const CC_NOT_ZERO: u8 = 0x85;

/// The x86-64 System V code generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct X86_64Backend;

impl Backend for X86_64Backend {
    fn name(&self) -> &'static str {
        "x86_64-sysv"
    }

    fn is_native(&self) -> bool {
        cfg!(all(target_arch = "x86_64", unix))
    }

    fn emit(&self, program: &Program, env: &NativeEnv) -> Result<Vec<u8>> {
        let mut asm = Assembler::new(program, env.intrinsics);
        asm.prologue(env.tape_len)?;

        for (index, opcode) in program.iter().enumerate() {
            match *opcode {
                OpCode::MoveRight(n) => asm.move_right(n),
                OpCode::MoveLeft(n) => asm.move_left(n),
                OpCode::Add(n) => asm.add_cell(n as u8),
                OpCode::Sub(n) => asm.sub_cell(n as u8),
                OpCode::Output(n) => {
                    for _ in 0..n {
                        asm.call_intrinsic(Intrinsic::Output);
                    }
                }
                OpCode::Input(n) => {
                    for _ in 0..n {
                        asm.call_intrinsic(Intrinsic::Input);
                    }
                }
                OpCode::JumpIfZero(_) => asm.loop_open(),
                OpCode::JumpIfNotZero(_) => asm.loop_close(index)?,
            }
        }

        let code = asm.finish(program.len())?;
        debug!(
            backend = self.name(),
            opcodes = program.len(),
            code_len = code.len(),
            "emitted native code"
        );
        Ok(code)
    }
}

/// Rough size of the code for `program`, used to reserve the buffer once.
pub fn estimate_len(program: &Program) -> usize {
    let body = program.iter().fold(0usize, |acc, op| {
        let len = match *op {
            OpCode::MoveRight(_) | OpCode::MoveLeft(_) => 16,
            OpCode::Add(_) | OpCode::Sub(_) => 5,
            OpCode::Output(n) => 35usize.saturating_mul(n as usize),
            OpCode::Input(n) => 34usize.saturating_mul(n as usize),
            OpCode::JumpIfZero(_) | OpCode::JumpIfNotZero(_) => 11,
        };
        acc.saturating_add(len)
    });
    body.saturating_add(PROLOGUE_LEN + EPILOGUE_LEN + FAULT_STUB_LEN)
}

/// Code buffer with its pending patch sites.
struct Assembler {
    code: Vec<u8>,
    intrinsics: Intrinsics,
    /// Displacement fields of loop openers still waiting for their closer
    patch_sites: LoopStack<usize>,
    /// Displacement fields of branches to the fault stub
    fault_sites: Vec<usize>,
    /// Displacement fields of branches taken when a host stream fails
    exit_sites: Vec<usize>,
}

impl Assembler {
    fn new(program: &Program, intrinsics: Intrinsics) -> Self {
        Self {
            code: Vec::with_capacity(estimate_len(program).min(MAX_RESERVE)),
            intrinsics,
            patch_sites: LoopStack::with_bound(program.len()),
            fault_sites: Vec::new(),
            exit_sites: Vec::new(),
        }
    }

    fn emit(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }

    fn emit_i32(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    fn patch(&mut self, site: usize, value: i32) {
        self.code[site..site + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// `mov reg, imm64` for a low register.
    fn mov_imm64(&mut self, reg: u8, value: u64) {
        self.emit(&[0x48, 0xB8 + reg]);
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// Near conditional branch with an empty displacement; returns the
    /// offset of the displacement field.
    fn jcc_rel32(&mut self, cc: u8) -> usize {
        self.emit(&[0x0F, cc]);
        let site = self.code.len();
        self.emit_i32(0);
        site
    }

    fn prologue(&mut self, tape_len: usize) -> Result<()> {
        let end = i32::try_from(tape_len).map_err(|_| {
            Error::InvalidConfig(format!("tape of {tape_len} cells exceeds the imm32 range"))
        })?;
        self.emit(&[0x41, 0x54]); // push r12
        self.emit(&[0x41, 0x55]); // push r13
        self.emit(&[0x41, 0x56]); // push r14
        self.emit(&[0x49, 0x89, 0xFC]); // mov r12, rdi
        self.emit(&[0x49, 0x89, 0xFD]); // mov r13, rdi
        self.emit(&[0x49, 0x89, 0xFE]); // mov r14, rdi
        self.emit(&[0x49, 0x81, 0xC6]); // add r14, imm32
        self.emit_i32(end);
        Ok(())
    }

    fn epilogue(&mut self) {
        self.emit(&[0x41, 0x5E]); // pop r14
        self.emit(&[0x41, 0x5D]); // pop r13
        self.emit(&[0x41, 0x5C]); // pop r12
        self.emit(&[0xC3]); // ret
    }

    fn move_right(&mut self, n: u32) {
        if n == 1 {
            self.emit(&[0x49, 0xFF, 0xC5]); // inc r13
        } else {
            for step in imm32_steps(n) {
                self.emit(&[0x49, 0x81, 0xC5]); // add r13, imm32
                self.emit_i32(step);
            }
        }
        self.emit(&[0x4D, 0x39, 0xF5]); // cmp r13, r14
        let site = self.jcc_rel32(CC_ABOVE_EQUAL);
        self.fault_sites.push(site);
    }

    fn move_left(&mut self, n: u32) {
        if n == 1 {
            self.emit(&[0x49, 0xFF, 0xCD]); // dec r13
        } else {
            for step in imm32_steps(n) {
                self.emit(&[0x49, 0x81, 0xED]); // sub r13, imm32
                self.emit_i32(step);
            }
        }
        self.emit(&[0x4D, 0x39, 0xE5]); // cmp r13, r12
        let site = self.jcc_rel32(CC_BELOW);
        self.fault_sites.push(site);
    }

    fn add_cell(&mut self, value: u8) {
        self.emit(&[0x41, 0x80, 0x45, 0x00, value]); // add byte [r13], imm8
    }

    fn sub_cell(&mut self, value: u8) {
        self.emit(&[0x41, 0x80, 0x6D, 0x00, value]); // sub byte [r13], imm8
    }

    fn cmp_cell_zero(&mut self) {
        self.emit(&[0x41, 0x80, 0x7D, 0x00, 0x00]); // cmp byte [r13], 0
    }

    /// Calls a host routine with the context in `rdi`.
    fn call_intrinsic(&mut self, intrinsic: Intrinsic) {
        self.mov_imm64(RDI, self.intrinsics.context());
        match intrinsic {
            Intrinsic::Output => self.emit(&[0x41, 0x0F, 0xB6, 0x75, 0x00]), // movzx esi, byte [r13]
            Intrinsic::Input => {}
            Intrinsic::BoundsFault => {
                self.emit(&[0x4C, 0x89, 0xEE]); // mov rsi, r13
                self.emit(&[0x4C, 0x29, 0xE6]); // sub rsi, r12
            }
        }
        self.mov_imm64(RAX, self.intrinsics.address(intrinsic));
        self.emit(&[0xFF, 0xD0]); // call rax
        if intrinsic == Intrinsic::BoundsFault {
            return;
        }

        self.emit(&[0x85, 0xC0]); // test eax, eax
        let site = self.jcc_rel32(CC_SIGN);
        self.exit_sites.push(site);
        if intrinsic == Intrinsic::Input {
            self.emit(&[0x41, 0x88, 0x45, 0x00]); // mov byte [r13], al
        }
    }

    fn loop_open(&mut self) {
        self.cmp_cell_zero();
        let site = self.jcc_rel32(CC_ZERO);
        self.patch_sites.push(site);
    }

    fn loop_close(&mut self, index: usize) -> Result<()> {
        let site = self.patch_sites.pop(index)?;
        let body = site + 4;

        self.cmp_cell_zero();
        let back = self.jcc_rel32(CC_NOT_ZERO);
        let end = back + 4;

        let backward = rel32(body, end)?;
        self.patch(back, backward);
        let forward = rel32(end, body)?;
        self.patch(site, forward);
        Ok(())
    }

    fn finish(mut self, opcode_count: usize) -> Result<Vec<u8>> {
        if !self.patch_sites.is_empty() {
            return Err(Error::unclosed_open(opcode_count));
        }
        let exit = self.code.len();
        for site in std::mem::take(&mut self.exit_sites) {
            let disp = rel32(exit, site + 4)?;
            self.patch(site, disp);
        }
        self.epilogue();

        if !self.fault_sites.is_empty() {
            let stub = self.code.len();
            for site in std::mem::take(&mut self.fault_sites) {
                let disp = rel32(stub, site + 4)?;
                self.patch(site, disp);
            }
            self.call_intrinsic(Intrinsic::BoundsFault);
            self.epilogue();
        }

        Ok(self.code)
    }
}

/// Displacement from the end of a branch (`next`) to `target`.
fn rel32(target: usize, next: usize) -> Result<i32> {
    let rel = target as i64 - next as i64;
    i32::try_from(rel)
        .map_err(|_| Error::Allocation(format!("branch displacement {rel} exceeds rel32")))
}

/// Splits a move into steps that fit a sign-extended imm32.
fn imm32_steps(n: u32) -> impl Iterator<Item = i32> {
    let max = i32::MAX as u32;
    let mut remaining = n;
    std::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        let step = remaining.min(max);
        remaining -= step;
        Some(step as i32)
    })
}
