// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bytecode virtual machine.
//!
//! ## Structure
//!
//! - `interpreter` - Reference execution loop over the opcodes
//! - `tape` - Cell storage and the cursor bounds policy, also used by the JIT

mod interpreter;
pub mod tape;

pub use interpreter::Interpreter;
pub use tape::{DEFAULT_TAPE_LEN, Tape};
