//! Compilation driver.
//!
//! - `options`: the configuration passed into one compilation
//! - `driver`: the `tokenize -> parse -> build_scopes -> generate` pipeline
//!   and the stub program substituted on semantic failure

pub mod driver;
pub mod options;

#[cfg(test)]
mod tests;
