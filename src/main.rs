//! Decaf to MIPS compiler CLI

use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use log::{error, info, LevelFilter};

use decafc::{
    compile_source, emulator::emulator::run, render_error, Capabilities, CompileOptions,
    LocalStorage,
};

#[derive(Parser)]
#[command(name = "decafc")]
#[command(about = "Compile Decaf source to MIPS assembly")]
#[command(version)]
struct Cli {
    /// Input .decaf file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Keep formals and locals in the call frame instead of static data
    #[arg(long)]
    frame_locals: bool,

    /// Reject class declarations
    #[arg(long)]
    no_classes: bool,

    /// Reject array types
    #[arg(long)]
    no_arrays: bool,

    /// Allow NewArray sizes that are not integer constants
    #[arg(long)]
    dynamic_array_sizes: bool,

    /// Execute the program in the built-in emulator, reading stdin as its input
    #[arg(long)]
    run: bool,

    /// Print the scope tree to stderr
    #[arg(long)]
    emit_scopes: bool,

    /// More logging (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> CompileOptions {
        CompileOptions {
            local_storage: if self.frame_locals {
                LocalStorage::Frame
            } else {
                LocalStorage::Static
            },
            capabilities: Capabilities {
                classes: !self.no_classes,
                arrays: !self.no_arrays,
                dynamic_array_sizes: self.dynamic_array_sizes,
            },
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match execute(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let source = fs::read_to_string(&cli.input)?;
    let file_name = cli
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("input.decaf");

    let compilation = match compile_source(&source, file_name, &cli.options()) {
        Ok(compilation) => compilation,
        Err(e) => {
            eprint!("{}", render_error(&e, &source));
            return Ok(ExitCode::FAILURE);
        }
    };

    if cli.emit_scopes {
        if let Some(scopes) = &compilation.scopes {
            eprint!("{}", scopes);
        }
    }

    if let Some(e) = &compilation.semantic_error {
        eprint!("{}", render_error(e, &source));
    }

    if cli.output.is_some() || !cli.run {
        write_output(cli.output.as_deref(), &compilation.assembly)?;
    }

    if cli.run {
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;

        let execution = run(&compilation.assembly, &input)?;
        info!("Program finished after {} steps", execution.steps);
        print!("{}", execution.output);
        io::stdout().flush()?;
    }

    if compilation.is_stub() {
        error!("Wrote stub program for {}", cli.input.display());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Writes to `path`, or stdout when no path is given. With `--run` and no
/// output file the assembly is not echoed, so stdout carries only the
/// program's own output.
fn write_output(path: Option<&Path>, assembly: &str) -> io::Result<()> {
    match path {
        Some(path) => fs::write(path, assembly),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(assembly.as_bytes())?;
            stdout.flush()
        }
    }
}
