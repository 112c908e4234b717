//! A small MIPS32 emulator for the code this compiler emits.
//!
//! - `assembler`: two-pass assembler turning SPIM-dialect text into decoded
//!   instructions and an initial data image
//! - `machine`: register file, sparse memory and the fetch/execute loop
//! - `emulator`: the [`run`](emulator::run) entry point and its error type

pub mod assembler;
pub mod emulator;
pub mod machine;
