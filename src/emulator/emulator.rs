use log::debug;
use thiserror::Error;

use super::{assembler::assemble, machine::Machine};

/// Step limit of [`run`]. A program that needs more is assumed to loop.
pub const DEFAULT_STEP_LIMIT: u64 = 5_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmulatorError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: unknown label `{label}`")]
    UnknownLabel { line: usize, label: String },
    #[error("line {line}: label `{label}` defined twice")]
    DuplicateLabel { line: usize, label: String },
    #[error("no `main` label to start from")]
    MissingEntryPoint,
    #[error("pc {pc:#010x} is outside the text segment")]
    PcOutOfRange { pc: u32 },
    #[error("unaligned word access at {address:#010x}")]
    Unaligned { address: u32 },
    #[error("division by zero at pc {pc:#010x}")]
    DivisionByZero { pc: u32 },
    #[error("unknown syscall {code} at pc {pc:#010x}")]
    UnknownSyscall { code: u32, pc: u32 },
    #[error("step limit of {limit} instructions exceeded")]
    StepLimit { limit: u64 },
}

/// What a finished program left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Everything written through the print syscalls.
    pub output: String,
    /// Instructions executed, including the final `exit` syscall.
    pub steps: u64,
}

/// Assembles `assembly` and runs it from `main` until it exits.
///
/// `input` feeds the read syscalls one line at a time.
pub fn run(assembly: &str, input: &str) -> Result<Execution, EmulatorError> {
    run_with_limit(assembly, input, DEFAULT_STEP_LIMIT)
}

pub fn run_with_limit(assembly: &str, input: &str, limit: u64) -> Result<Execution, EmulatorError> {
    let program = assemble(assembly)?;
    debug!(
        "assembled {} instructions and {} bytes of data",
        program.text.len(),
        program.data.len()
    );

    let mut machine = Machine::new(&program, input)?;
    machine.run(limit)?;
    Ok(machine.into_execution())
}
