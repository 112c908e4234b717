use std::{rc::Rc, time::Instant};

use log::{info, warn};

use crate::{
    codegen::codegen::generate,
    errors::errors::Error,
    lexer::lexer::tokenize,
    parser::parser::parse,
    semantic::{context::CompilationContext, scope_builder::build_scopes},
};

use super::options::CompileOptions;

/// The artifact emitted in place of a program that failed semantic analysis.
/// It reports the failure at runtime and exits.
pub const STUB_PROGRAM: &str = "\t.text
\t.globl main
main:
\tla $a0, _semantic_error
\tli $v0, 4
\tsyscall
\tli $v0, 10
\tsyscall
\t.data
_semantic_error:\t.asciiz \"Semantic Error\\n\"
";

/// Result of a compilation that got past the front end.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// The generated program, or [`STUB_PROGRAM`] after a semantic error.
    pub assembly: String,
    /// The first semantic (or internal) error, if any.
    pub semantic_error: Option<Error>,
    /// Listing of the scope tree, when scope building succeeded.
    pub scopes: Option<String>,
}

impl Compilation {
    pub fn is_stub(&self) -> bool {
        self.semantic_error.is_some()
    }
}

/// Compiles Decaf source text to MIPS assembly.
///
/// Lexical and syntax errors are returned as `Err`. Any later error is
/// recorded in the returned [`Compilation`], whose assembly is then the stub.
pub fn compile_source(
    source: &str,
    file: &str,
    options: &CompileOptions,
) -> Result<Compilation, Error> {
    let start = Instant::now();
    let tokens = tokenize(source.to_string(), Some(file.to_string()))?;
    info!("Tokenized in {:?}", start.elapsed());

    let parse_start = Instant::now();
    let program = parse(tokens, Rc::new(file.to_string()))?;
    info!("Parsed in {:?}", parse_start.elapsed());

    let mut ctx = CompilationContext::new(*options);

    let scope_start = Instant::now();
    let analysis = match build_scopes(&program, &mut ctx) {
        Ok(analysis) => analysis,
        Err(error) => return Ok(abort(error, None)),
    };
    info!("Built scopes in {:?}", scope_start.elapsed());
    let scopes = Some(analysis.tree.dump());

    let generate_start = Instant::now();
    let assembly = match generate(&program, &analysis, &mut ctx) {
        Ok(assembly) => assembly,
        Err(error) => return Ok(abort(error, scopes)),
    };
    info!("Generated code in {:?}", generate_start.elapsed());
    info!("Total time for compilation: {:?}", start.elapsed());

    Ok(Compilation {
        assembly,
        semantic_error: None,
        scopes,
    })
}

fn abort(error: Error, scopes: Option<String>) -> Compilation {
    warn!("semantic error, emitting stub program: {}", error);
    Compilation {
        assembly: STUB_PROGRAM.to_string(),
        semantic_error: Some(error),
        scopes,
    }
}
