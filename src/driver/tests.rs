use crate::{
    errors::errors::{ErrorCategory, ErrorImpl},
    Capabilities, CompileOptions, LocalStorage,
};

use super::driver::{compile_source, STUB_PROGRAM};

#[test]
fn test_successful_compilation() {
    let compilation = compile_source(
        "int g; void main() { g = 1; Print(g); }",
        "ok.decaf",
        &CompileOptions::default(),
    )
    .unwrap();

    assert!(!compilation.is_stub());
    assert!(compilation.semantic_error.is_none());
    assert!(compilation.assembly.starts_with("\t.text\n\t.globl main\n"));
    assert!(compilation.assembly.contains("\nmain:\n"));
    assert!(compilation.assembly.contains("\t.data\n"));
    assert!(compilation
        .scopes
        .as_deref()
        .is_some_and(|dump| dump.contains("var g: int @ 0($gp)")));
}

#[test]
fn test_semantic_error_emits_stub() {
    let compilation = compile_source(
        "void helper() { Print(1); } void main() { x = 1; }",
        "bad.decaf",
        &CompileOptions::default(),
    )
    .unwrap();

    assert!(compilation.is_stub());
    assert_eq!(compilation.assembly, STUB_PROGRAM);
    assert!(!compilation.assembly.contains("func.helper"));

    let error = compilation.semantic_error.unwrap();
    assert!(matches!(
        error.get_kind(),
        ErrorImpl::VariableNotDeclared { variable } if variable == "x"
    ));
    assert_eq!(error.get_position().line, 1);

    // Scope building succeeded, so the listing is still available
    assert!(compilation.scopes.is_some());
}

#[test]
fn test_scope_error_has_no_listing() {
    let compilation =
        compile_source("int x; int x;", "dup.decaf", &CompileOptions::default()).unwrap();

    assert!(compilation.is_stub());
    assert!(compilation.scopes.is_none());
    assert!(matches!(
        compilation.semantic_error.unwrap().get_kind(),
        ErrorImpl::VariableAlreadyDeclared { .. }
    ));
}

#[test]
fn test_front_end_errors_are_returned() {
    let error = compile_source("void main() { x = ; }", "parse.decaf", &CompileOptions::default())
        .unwrap_err();
    assert_eq!(error.category(), ErrorCategory::Syntax);
    assert!(!error.is_semantic());

    let error = compile_source("void main() { $ }", "lex.decaf", &CompileOptions::default())
        .unwrap_err();
    assert_eq!(error.category(), ErrorCategory::Lexical);
}

#[test]
fn test_options_reach_the_passes() {
    let source = "class A { } void main() { }";
    let options = CompileOptions {
        local_storage: LocalStorage::Frame,
        capabilities: Capabilities {
            classes: false,
            ..Capabilities::default()
        },
    };

    let compilation = compile_source(source, "caps.decaf", &options).unwrap();
    assert!(compilation.is_stub());
    assert!(matches!(
        compilation.semantic_error.unwrap().get_kind(),
        ErrorImpl::UnsupportedFeature { .. }
    ));

    let compilation = compile_source(source, "caps.decaf", &CompileOptions::default()).unwrap();
    assert!(!compilation.is_stub());
}
