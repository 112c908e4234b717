//! Semantic analysis.
//!
//! - `scope`: the scope tree and the entities it registers (types,
//!   variables, functions, classes)
//! - `scope_builder`: the first pass, which builds the tree, assigns storage
//!   and labels, and records the scope every node is evaluated in
//! - `context`: per-compilation counters shared by both passes

pub mod context;
pub mod scope;
pub mod scope_builder;

#[cfg(test)]
mod tests;
