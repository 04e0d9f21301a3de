pub mod cli;
pub mod error;
pub mod model;
pub mod processor;
pub mod writer;

pub use error::CompileError;
pub use model::{Item, Options};
pub use processor::Compiler;

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, anyhow};
use clap::Parser;
use tracing::info;

/// Compile `code` with the built-in option defaults.
pub fn compile(code: &str) -> Result<Vec<Item>, CompileError> {
    Compiler::new().compile(code)
}

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(args.log_level.as_str())
        .with_writer(io::stderr)
        .init();

    let compile_args = match args.command {
        cli::Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        cli::Command::Compile(compile_args) => compile_args,
    };

    // 1. ── Read ───────────────────────────────────────────────────────
    let code = std::fs::read_to_string(&compile_args.input)
        .with_context(|| format!("Reading {}", compile_args.input.display()))?;

    // 2. ── Compile ────────────────────────────────────────────────────
    let options = compile_args.options().map_err(|e| anyhow!(e))?;
    let items = Compiler::with_options(options)
        .compile(&code)
        .with_context(|| format!("Compiling {}", compile_args.input.display()))?;
    info!(items = items.len(), "compiled {}", compile_args.input.display());

    // 3. ── Write output ───────────────────────────────────────────────
    let mut out: Box<dyn Write> = match &compile_args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    match compile_args.format {
        cli::Format::Text => writer::text::emit(&items, &mut out).with_context(|| "Writing items")?,
        cli::Format::Json => writer::json::emit(&items, &mut out).with_context(|| "Writing items")?,
    }
    out.flush().with_context(|| "Flushing output")?;

    Ok(())
}
