//! `c67c`: reads a JSON-encoded program, compiles it for a target triple, and writes the
//! resulting executable image to disk.

mod cli;
mod config;
mod error;

use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use config::CompileManifest;
use error::DriverError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), DriverError> {
    let program_text = read_input(&cli.input)?;
    let program: c67c_ast::Program = serde_json::from_str(&program_text).map_err(|source| DriverError::ProgramJson {
        path: cli.input.display().to_string(),
        source,
    })?;

    let target = match &cli.target {
        Some(triple) => c67c_target::Target::parse(triple)?,
        None => c67c_target::Target::host(),
    };
    log::info!("targeting {}", target.triple());

    let mut options = c67c::CompileOptions::default();
    if let Some(config_path) = &cli.config {
        let text = fs::read_to_string(config_path).map_err(|source| DriverError::Io {
            path: config_path.display().to_string(),
            source,
        })?;
        CompileManifest::parse(&text)?.apply(&mut options);
    }
    if let Some(entry_symbol) = cli.entry_symbol {
        options.entry_symbol = entry_symbol;
    }
    if cli.dead_code_elimination {
        options.optimize.dead_code_elimination = true;
    }
    if cli.integer_strength_reduction {
        options.optimize.integer_strength_reduction = true;
    }

    let image = c67c::compile(program, &target, &options)?;

    let output_path = cli.output.unwrap_or_else(|| default_output_path(&cli.input));
    fs::write(&output_path, &image).map_err(|source| DriverError::Io {
        path: output_path.display().to_string(),
        source,
    })?;
    set_executable(&output_path).map_err(|source| DriverError::Io {
        path: output_path.display().to_string(),
        source,
    })?;

    log::info!("wrote {} ({} bytes)", output_path.display(), image.len());
    Ok(())
}

fn read_input(path: &Path) -> Result<String, DriverError> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map_err(|source| DriverError::Io {
            path: "<stdin>".to_string(),
            source,
        })?;
        Ok(buf)
    } else {
        fs::read_to_string(path).map_err(|source| DriverError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

fn default_output_path(input: &Path) -> std::path::PathBuf {
    input.with_extension("")
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
