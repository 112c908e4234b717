//! Code generation module for the compiler.
//!
//! This module lowers a scope-annotated [`Program`](crate::ast::ast::Program)
//! into MIPS32 assembly text. It handles:
//!
//! - The calling convention (prologue, formal copies, epilogue)
//! - Expression lowering over a shadow operand stack, with type checking
//! - Control-flow labels and the `break`/`continue` target stack
//! - The runtime helper routines for strings, arrays and I/O

pub mod codegen;
pub mod expr;
pub mod runtime;
pub mod stmt;

#[cfg(test)]
mod tests;
