// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! bfjit - run tape-language programs through the JIT or the interpreter

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use bfjit_engine::{DEFAULT_TAPE_LEN, Engine, EngineConfig, ExecutionMode};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "bfjit",
    about = "Compile and run tape-language programs",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Program source file
    file: PathBuf,

    /// Run with the interpreter instead of the JIT
    #[arg(short = 'i', long = "interpreted")]
    interpreted: bool,

    /// Number of cells on the tape
    #[arg(long, value_name = "CELLS", env = "BFJIT_TAPE_SIZE", default_value_t = DEFAULT_TAPE_LEN)]
    tape_size: usize,

    /// Print the first N cells to stderr after the run
    #[arg(long, value_name = "N")]
    dump_cells: Option<usize>,

    /// Write the generated machine code to PATH and exit
    #[arg(long, value_name = "PATH")]
    emit_native: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> EngineConfig {
        let mode = if self.interpreted {
            ExecutionMode::Interpret
        } else {
            ExecutionMode::Jit
        };
        EngineConfig::default()
            .with_tape_len(self.tape_size)
            .with_mode(mode)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "bfjit=debug,bfjit_engine=debug"
    } else {
        "bfjit=warn,bfjit_engine=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let source = load_source(&cli.file)?;
    let mut config = cli.config();

    if let Some(path) = &cli.emit_native {
        // Emission never executes, so the interpreter mode avoids the host check.
        config = config.with_mode(ExecutionMode::Interpret);
        let engine = Engine::new(config)?;
        let code = engine
            .emit_native(&source)
            .with_context(|| format!("failed to compile '{}'", cli.file.display()))?;
        fs::write(path, &code)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        tracing::info!(bytes = code.len(), path = %path.display(), "wrote native code");
        return Ok(());
    }

    let engine = Engine::new(config)?;
    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    let result = engine.run(&source, stdin, stdout);

    let tape = result.with_context(|| format!("failed to run '{}'", cli.file.display()))?;
    if let Some(n) = cli.dump_cells {
        let mut stderr = io::stderr().lock();
        stderr.write_all(tape.hex_dump(n).as_bytes())?;
    }
    Ok(())
}

/// Reads a program file. Bytes outside the instruction set are comments, so
/// invalid UTF-8 is replaced rather than rejected.
fn load_source(path: &Path) -> anyhow::Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["bfjit", "hello.b"]).unwrap();
        assert_eq!(cli.file, PathBuf::from("hello.b"));
        assert!(!cli.interpreted);
        assert!(cli.dump_cells.is_none());
        assert!(cli.emit_native.is_none());

        let config = cli.config();
        assert_eq!(config.mode, ExecutionMode::Jit);
        assert_eq!(config.tape_len, DEFAULT_TAPE_LEN);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "bfjit",
            "-i",
            "--tape-size",
            "64",
            "--dump-cells",
            "16",
            "-v",
            "prog.bf",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.dump_cells, Some(16));

        let config = cli.config();
        assert_eq!(config.mode, ExecutionMode::Interpret);
        assert_eq!(config.tape_len, 64);
    }

    #[test]
    fn test_file_is_required() {
        assert!(Cli::try_parse_from(["bfjit"]).is_err());
        assert!(Cli::try_parse_from(["bfjit", "--tape-size", "many", "x.b"]).is_err());
    }

    #[test]
    fn test_load_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"+\xFF+.").unwrap();
        let source = load_source(file.path()).unwrap();
        assert!(source.starts_with('+'));
        assert!(source.ends_with("+."));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_source(&dir.path().join("missing.b")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read"));
    }

    #[test]
    fn test_emit_native_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("prog.b");
        let out = dir.path().join("prog.bin");
        fs::write(&src, "+[-]").unwrap();

        let cli = Cli::try_parse_from([
            OsStr::new("bfjit"),
            OsStr::new("--emit-native"),
            out.as_os_str(),
            src.as_os_str(),
        ])
        .unwrap();
        run(&cli).unwrap();

        let code = fs::read(&out).unwrap();
        assert_eq!(code.last(), Some(&0xC3));
    }

    #[test]
    fn test_unbalanced_program_fails() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("bad.b");
        fs::write(&src, "[[]").unwrap();

        let cli =
            Cli::try_parse_from([OsStr::new("bfjit"), OsStr::new("-i"), src.as_os_str()]).unwrap();
        let err = run(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("unbalanced loop"));
    }
}
