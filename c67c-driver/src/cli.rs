//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;

/// Compile a pre-parsed program (JSON AST) to a native executable.
#[derive(Parser, Debug)]
#[command(name = "c67c")]
#[command(about = "Multi-target ahead-of-time compiler backend")]
#[command(version)]
pub struct Cli {
    /// Path to the JSON-encoded program to compile. Pass `-` to read from stdin.
    #[arg(value_name = "PROGRAM")]
    pub input: PathBuf,

    /// Where to write the compiled executable. Defaults to `PROGRAM` with its extension stripped.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Target triple, e.g. `x86_64-unknown-linux-gnu` or `aarch64-apple-darwin`. Defaults to the
    /// host triple.
    #[arg(long, value_name = "TRIPLE")]
    pub target: Option<String>,

    /// Optional `compile.toml` manifest overriding the optimizer/entry-symbol defaults. CLI flags
    /// below take precedence over whatever the manifest sets.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Symbol the container's entry point is marked with.
    #[arg(long, value_name = "SYMBOL")]
    pub entry_symbol: Option<String>,

    /// Enable dead code elimination.
    #[arg(long)]
    pub dead_code_elimination: bool,

    /// Enable integer power-of-two strength reduction.
    #[arg(long)]
    pub integer_strength_reduction: bool,

    /// Increase log verbosity (`-v` debug, `-vv` trace). Default is `info`.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
