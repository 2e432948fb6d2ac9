// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! End-to-end runs through the public API, in both execution modes.

use std::io::{self, Read, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bfjit_engine::{
    EOF_SENTINEL, Engine, EngineConfig, Error, ExecutionMode, OpCode, Result, Tape, compile,
};

const HELLO_WORLD: &str = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";
const ECHO: &str = "+[,+[-.,+]]";

/// Prints 'A' to 'Z', then a newline.
const ALPHABET: &str = "++++++++[>++++++++<-]>+>+++++[>+++++<-]>+[<<.+>>-]++++++++++.";

fn run(mode: ExecutionMode, src: &str, input: &[u8], tape_len: usize) -> (Result<Tape>, Vec<u8>) {
    let engine = Engine::new(
        EngineConfig::default()
            .with_mode(mode)
            .with_tape_len(tape_len),
    )
    .expect("Engine should build");
    let mut out = Vec::new();
    let result = engine.run(src, input, &mut out);
    (result, out)
}

/// Accepts `budget` bytes, then fails every write and flush.
struct BrokenPipe {
    written: Vec<u8>,
    budget: usize,
}

impl Write for BrokenPipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written.len() >= self.budget {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        self.written.push(buf[0]);
        Ok(1)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.written.len() >= self.budget {
            return Err(io::Error::other("flush after broken pipe"));
        }
        Ok(())
    }
}

/// Yields its bytes one at a time, then fails instead of reporting EOF.
struct ResetInput {
    data: Vec<u8>,
}

impl Read for ResetInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.data.is_empty() {
            return Err(io::ErrorKind::ConnectionReset.into());
        }
        buf[0] = self.data.remove(0);
        Ok(1)
    }
}

/// Runs on a worker thread so that a run which never stops fails the test.
fn run_bounded<R, W>(mode: ExecutionMode, src: &'static str, input: R, output: W) -> (Result<Tape>, W)
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let engine = Engine::new(EngineConfig::default().with_mode(mode).with_tape_len(16))
            .expect("Engine should build");
        let mut output = output;
        let result = engine.run(src, input, &mut output);
        let _ = tx.send((result, output));
    });
    rx.recv_timeout(Duration::from_secs(10))
        .unwrap_or_else(|_| panic!("{mode} run of {src} did not stop"))
}

fn io_kind(result: Result<Tape>) -> io::ErrorKind {
    match result {
        Err(Error::Io(e)) => e.kind(),
        other => panic!("expected an I/O error, got {other:?}"),
    }
}

fn modes() -> Vec<ExecutionMode> {
    let mut modes = vec![ExecutionMode::Interpret];
    if cfg!(all(target_arch = "x86_64", unix)) {
        modes.push(ExecutionMode::Jit);
    }
    modes
}

#[test]
fn test_write_error_stops_every_mode() {
    for mode in modes() {
        let out = BrokenPipe {
            written: Vec::new(),
            budget: 5,
        };
        let (result, out) = run_bounded(mode, "+[.]", io::empty(), out);
        assert_eq!(io_kind(result), io::ErrorKind::BrokenPipe, "{mode}");
        assert_eq!(out.written, [1; 5], "{mode}");
    }
}

#[test]
fn test_read_error_stops_every_mode() {
    for mode in modes() {
        let input = ResetInput {
            data: b"ab".to_vec(),
        };
        let (result, out) = run_bounded(mode, "+[,.]", input, Vec::new());
        assert_eq!(io_kind(result), io::ErrorKind::ConnectionReset, "{mode}");
        assert_eq!(out, b"ab", "{mode}");
    }
}

fn interpret(src: &str, input: &[u8]) -> Vec<u8> {
    let (result, out) = run(ExecutionMode::Interpret, src, input, 30_000);
    result.expect("Execution should succeed");
    out
}

#[test]
fn test_hello_world_interpreted() {
    assert_eq!(interpret(HELLO_WORLD, b""), b"Hello World!\n");
}

#[test]
fn test_echo_interpreted() {
    assert_eq!(interpret(ECHO, b"tape\nmachine"), b"tape\nmachine");
}

#[test]
fn test_empty_source_interpreted() {
    let (result, out) = run(ExecutionMode::Interpret, "", b"ignored", 8);
    assert_eq!(result.unwrap().cells(), &[0; 8]);
    assert!(out.is_empty());
}

#[test]
fn test_unbalanced_sources_rejected() {
    for (src, offset) in [("[[]", 0), ("[]]", 2), ("]", 0), ("+[>[<]", 1)] {
        match compile(src) {
            Err(Error::UnbalancedLoop { offset: at, .. }) => assert_eq!(at, offset, "{src}"),
            other => panic!("{src}: expected unbalanced loop, got {other:?}"),
        }
    }
}

#[test]
fn test_runs_fold_to_single_opcode() {
    for (ch, expected) in [('>', OpCode::MoveRight(40)), ('.', OpCode::Output(40))] {
        let program = compile(&ch.to_string().repeat(40)).unwrap();
        assert_eq!(program.instructions(), &[expected]);
    }
}

#[test]
fn test_loop_targets_pair_up() {
    let program = compile(HELLO_WORLD).unwrap();
    for (i, op) in program.iter().enumerate() {
        if let OpCode::JumpIfZero(j) = *op {
            assert!(i < j);
            assert_eq!(program.get(j), Some(&OpCode::JumpIfNotZero(i)));
        }
    }
    assert_eq!(program.loop_count(), 3);
}

#[test]
fn test_eof_sentinel_interpreted() {
    let (result, _) = run(ExecutionMode::Interpret, ",>,", b"x", 2);
    assert_eq!(result.unwrap().cells(), &[b'x', EOF_SENTINEL]);
}

#[test]
fn test_emit_native_on_any_host() {
    let engine = Engine::new(EngineConfig::default().with_mode(ExecutionMode::Interpret)).unwrap();
    let code = engine.emit_native(HELLO_WORLD).unwrap();
    assert_eq!(code.last(), Some(&0xC3));
    assert!(matches!(
        engine.emit_native("[["),
        Err(Error::UnbalancedLoop { .. })
    ));
}

#[cfg(all(target_arch = "x86_64", unix))]
mod native {
    use super::*;

    fn both(src: &str, input: &[u8], tape_len: usize) -> (Vec<u8>, Tape) {
        let (interpreted, out_i) = run(ExecutionMode::Interpret, src, input, tape_len);
        let (jitted, out_j) = run(ExecutionMode::Jit, src, input, tape_len);
        assert_eq!(out_i, out_j, "output differs for {src}");
        let tape_i = interpreted.expect("Interpreter should succeed");
        let tape_j = jitted.expect("JIT should succeed");
        assert_eq!(tape_i, tape_j, "final tape differs for {src}");
        (out_j, tape_j)
    }

    #[test]
    fn test_hello_world_jit() {
        let (out, _) = both(HELLO_WORLD, b"", 30_000);
        assert_eq!(out, b"Hello World!\n");
    }

    #[test]
    fn test_echo_jit() {
        let (out, _) = both(ECHO, b"round\ntrip", 16);
        assert_eq!(out, b"round\ntrip");
    }

    #[test]
    fn test_empty_source_jit() {
        let (out, tape) = both("", b"", 30_000);
        assert!(out.is_empty());
        assert!(tape.cells().iter().all(|&c| c == 0));
    }

    #[test]
    fn test_parity_over_programs() {
        let programs = [
            ALPHABET,
            "+++++[>+++++++++<-]>.<++[>+.<-]",
            "-[.-]",
            "++>+++>++++<<[->[->+<]<]>>.",
            "++[>++[>+<-]<-]>>.",
            "+++[>+++[>+++<-]<-]>>.",
            "comments are ignored +++ but this counts .",
        ];
        for src in programs {
            both(src, b"", 64);
        }
        let (out, _) = both(ALPHABET, b"", 16);
        assert_eq!(out, b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\n");
    }

    #[test]
    fn test_input_parity() {
        let (_, tape) = both(",>,,>,,,", b"abcdef", 4);
        assert_eq!(tape.cells(), &[b'a', b'c', b'f', 0]);
    }

    #[test]
    fn test_bounds_parity() {
        for (src, offset) in [("+.<", -1), ("+[.>+]", 4), (">>>>", 4)] {
            let (interpreted, out_i) = run(ExecutionMode::Interpret, src, b"", 4);
            let (jitted, out_j) = run(ExecutionMode::Jit, src, b"", 4);
            assert_eq!(out_i, out_j, "{src}");
            for result in [interpreted, jitted] {
                match result {
                    Err(Error::MemoryOutOfBounds { offset: at, tape_len }) => {
                        assert_eq!(at, offset, "{src}");
                        assert_eq!(tape_len, 4);
                    }
                    other => panic!("{src}: expected out of bounds, got {other:?}"),
                }
            }
        }
    }
}
