//! Error types and error handling for the compiler.
//!
//! Every stage reports failures through the single [`errors::Error`] type:
//! a kind ([`errors::ErrorImpl`]) plus the source position it was raised at.
//! Semantic errors are never recovered from; the first one aborts generation.

pub mod errors;
