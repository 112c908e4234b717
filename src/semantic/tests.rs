//! Unit tests for the semantic module.
//!
//! This module contains tests for:
//! - Scope tree inserts, shadowing and lookups across the parent chain
//! - Storage and label assignment by the scope builder
//! - Classes, the implicit `this` formal and member freezing
//! - Capability switches and the entry-point requirement

use std::rc::Rc;

use crate::{
    ast::{
        ast::{Decl, Program},
        statements::StmtKind,
    },
    driver::options::{CompileOptions, LocalStorage},
    errors::errors::{Error, ErrorImpl},
    lexer::lexer::tokenize,
    parser::parser::parse,
    Position,
};

use super::{
    context::CompilationContext,
    scope::{ScopeKind, ScopeTree, Storage, Type, Variable},
    scope_builder::{build_scopes, ScopeAnalysis},
};

fn parse_source(source: &str) -> Program {
    let tokens = tokenize(source.to_string(), Some("test.decaf".to_string())).unwrap();
    parse(tokens, Rc::new("test.decaf".to_string())).unwrap()
}

fn analyze_with(source: &str, options: CompileOptions) -> Result<ScopeAnalysis, Error> {
    let program = parse_source(source);
    let mut ctx = CompilationContext::new(options);
    build_scopes(&program, &mut ctx)
}

fn analyze(source: &str) -> Result<ScopeAnalysis, Error> {
    analyze_with(source, CompileOptions::default())
}

fn error_of(source: &str) -> ErrorImpl {
    analyze(source).unwrap_err().get_kind().clone()
}

fn variable(name: &str, type_: Type, offset: u32) -> Variable {
    Variable {
        name: name.to_string(),
        type_,
        storage: Storage::Static(offset),
        position: Position::null(),
    }
}

#[test]
fn test_duplicate_in_one_scope_is_rejected() {
    let mut tree = ScopeTree::new();
    let root = tree.root();

    tree.add_var(root, variable("x", Type::Int, 0)).unwrap();
    let error = tree.add_var(root, variable("x", Type::Bool, 4)).unwrap_err();
    assert!(matches!(
        error.get_kind(),
        ErrorImpl::VariableAlreadyDeclared { .. }
    ));

    let error = tree
        .add_type(root, "int", Type::Int, &Position::null())
        .unwrap_err();
    assert!(matches!(error.get_kind(), ErrorImpl::TypeAlreadyDeclared { .. }));
}

#[test]
fn test_shadowing_and_lookup_chain() {
    let mut tree = ScopeTree::new();
    let root = tree.root();
    let outer = tree.add_scope(root, ScopeKind::Body(String::from("main")));
    let shadowing = tree.add_scope(outer, ScopeKind::Branch);
    let nested = tree.add_scope(shadowing, ScopeKind::Loop);
    let sibling = tree.add_scope(outer, ScopeKind::Branch);

    tree.add_var(outer, variable("x", Type::Int, 0)).unwrap();
    tree.add_var(shadowing, variable("x", Type::Double, 4)).unwrap();

    let position = Position::null();
    assert_eq!(tree.find_var(outer, "x", &position).unwrap().type_, Type::Int);
    assert_eq!(
        tree.find_var(shadowing, "x", &position).unwrap().type_,
        Type::Double
    );
    assert_eq!(
        tree.find_var(nested, "x", &position).unwrap().type_,
        Type::Double
    );
    assert_eq!(tree.find_var(sibling, "x", &position).unwrap().type_, Type::Int);

    assert!(matches!(
        tree.find_var(root, "x", &position).unwrap_err().get_kind(),
        ErrorImpl::VariableNotDeclared { .. }
    ));
    assert_eq!(tree.find_type(nested, "string", &position).unwrap(), Type::String);
    assert!(matches!(
        tree.find_func(nested, "f", &position).unwrap_err().get_kind(),
        ErrorImpl::FunctionNotDeclared { .. }
    ));

    let chain: Vec<_> = tree.chain(nested).map(|scope| scope.id).collect();
    assert_eq!(chain, vec![nested, shadowing, outer, root]);
}

#[test]
fn test_static_storage_and_labels() {
    let analysis = analyze(
        "int g; double h;
         int add(int a, int b) { int sum; sum = a + b; return sum; }
         void main() { }",
    )
    .unwrap();
    let tree = &analysis.tree;
    let root = tree.scope(tree.root());

    assert_eq!(root.get_variable("g").unwrap().storage, Storage::Static(0));
    assert_eq!(root.get_variable("h").unwrap().storage, Storage::Static(4));

    let add = root.get_function("add").unwrap();
    assert_eq!(add.label, "func.add");
    assert_eq!(add.end_label(), "func.add.end");
    assert_eq!(add.return_type, Type::Int);
    let formals: Vec<_> = add
        .formals
        .iter()
        .map(|formal| (formal.name.as_str(), formal.storage))
        .collect();
    assert_eq!(
        formals,
        vec![("a", Storage::Static(8)), ("b", Storage::Static(12))]
    );
    assert_eq!(add.frame_size, 0);

    let main = root.get_function("main").unwrap();
    assert_eq!(main.label, "main");
    assert!(main.is_entry_point());
    assert_eq!(main.return_type, Type::Void);
}

#[test]
fn test_frame_storage() {
    let options = CompileOptions {
        local_storage: LocalStorage::Frame,
        ..CompileOptions::default()
    };
    let analysis = analyze_with(
        "int g;
         int f(int a, int b) { int c; if (true) { int d; } return c; }
         void main() { int x; }",
        options,
    )
    .unwrap();
    let root = analysis.tree.scope(analysis.tree.root());

    assert_eq!(root.get_variable("g").unwrap().storage, Storage::Static(0));

    let f = root.get_function("f").unwrap();
    let offsets: Vec<_> = f.formals.iter().map(|formal| formal.storage).collect();
    assert_eq!(offsets, vec![Storage::Frame(-4), Storage::Frame(-8)]);
    assert_eq!(f.frame_size, 16);

    let main = root.get_function("main").unwrap();
    assert_eq!(main.frame_size, 4);
}

#[test]
fn test_formals_and_body_scopes() {
    // A body may shadow a formal, but not redeclare within itself
    assert!(analyze("void f(int a) { int a; } void main() { }").is_ok());
    assert!(matches!(
        error_of("void f(int a, bool a) { } void main() { }"),
        ErrorImpl::VariableAlreadyDeclared { .. }
    ));
    assert!(matches!(
        error_of("void main() { int x; bool x; }"),
        ErrorImpl::VariableAlreadyDeclared { .. }
    ));
    assert!(matches!(
        error_of("void f() { } int f() { return 1; } void main() { }"),
        ErrorImpl::FunctionAlreadyDeclared { .. }
    ));
    assert!(matches!(
        error_of("void main() { Foo x; }"),
        ErrorImpl::UnknownType { .. }
    ));
}

#[test]
fn test_branches_get_sibling_scopes() {
    assert!(analyze(
        "void main() {
             if (true) { int x; } else { int x; }
             while (true) { int x; }
             for (;;) { int x; }
         }"
    )
    .is_ok());
}

#[test]
fn test_for_clauses_share_one_scope() {
    let program = parse_source("void main() { int i; for (i = 0; i < 3; i = i + 1) { } }");
    let mut ctx = CompilationContext::new(CompileOptions::default());
    let analysis = build_scopes(&program, &mut ctx).unwrap();

    let Decl::Function(main) = &program.decls[0] else {
        panic!("expected main");
    };
    let StmtKind::For(for_stmt) = &main.body.body[1].kind else {
        panic!("expected a for statement");
    };

    let clauses = [&for_stmt.init, &for_stmt.condition, &for_stmt.update]
        .into_iter()
        .flatten()
        .map(|clause| analysis.scope_of(clause.id).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(clauses.len(), 3);
    assert!(clauses.iter().all(|scope| *scope == clauses[0]));
    assert_eq!(analysis.tree.scope(clauses[0]).kind, ScopeKind::ForClauses);

    let body = analysis.scope_of(for_stmt.body.id).unwrap();
    assert_eq!(analysis.tree.scope(body).kind, ScopeKind::Loop);
    assert_eq!(analysis.tree.scope(body).parent, Some(clauses[0]));
}

#[test]
fn test_class_members_and_this() {
    let analysis = analyze(
        "class Point {
             int x;
             int y;
             int sum(int scale) { return x + y; }
             Point self() { return this; }
         }
         void main() { }",
    )
    .unwrap();
    let tree = &analysis.tree;

    assert_eq!(tree.classes().len(), 1);
    let class = tree.class(0);
    assert_eq!(&*class.name, "Point");
    assert_eq!(class.size, 12);
    assert!(tree.dump().ends_with("class Point: 12 bytes\n"));
    assert_eq!(class.members["x"].storage, Storage::Field(4));
    assert_eq!(class.members["y"].storage, Storage::Field(8));

    let sum = &class.methods["sum"];
    assert_eq!(sum.label, "method.Point.sum");
    assert!(sum.is_method());
    assert_eq!(sum.formals.len(), 2);
    assert_eq!(sum.formals[0].name, "this");
    assert_eq!(sum.formals[0].type_, Type::Class(class.class_ref()));

    // The class type resolves from inside its own methods
    assert_eq!(class.methods["self"].return_type, Type::Class(class.class_ref()));

    // Methods are not visible from the root scope
    let root = tree.scope(tree.root());
    assert!(root.get_function("sum").is_none());
    assert!(root.get_type("Point").is_some());
}

#[test]
fn test_class_errors() {
    assert!(matches!(
        error_of("class A { int x; void x() { } } void main() { }"),
        ErrorImpl::DuplicateClassMember { .. }
    ));
    assert!(matches!(
        error_of("class A { int x; bool x; } void main() { }"),
        ErrorImpl::VariableAlreadyDeclared { .. }
    ));
    assert!(matches!(
        error_of("class A { } class A { } void main() { }"),
        ErrorImpl::TypeAlreadyDeclared { .. }
    ));
}

#[test]
fn test_entry_point_is_required() {
    assert!(matches!(
        error_of("int main;"),
        ErrorImpl::MissingEntryPoint
    ));
    assert!(matches!(
        error_of("class A { void main() { } }"),
        ErrorImpl::MissingEntryPoint
    ));
}

#[test]
fn test_capabilities() {
    let mut options = CompileOptions::default();
    options.capabilities.classes = false;
    let error = analyze_with("class A { } void main() { }", options).unwrap_err();
    assert!(matches!(
        error.get_kind(),
        ErrorImpl::UnsupportedFeature { feature } if feature == "class"
    ));

    let mut options = CompileOptions::default();
    options.capabilities.arrays = false;
    let error = analyze_with("void main() { int[] a; }", options).unwrap_err();
    assert!(matches!(
        error.get_kind(),
        ErrorImpl::UnsupportedFeature { feature } if feature == "array"
    ));
}

#[test]
fn test_dump_lists_scopes() {
    let analysis = analyze("int g; void main() { int x; }").unwrap();
    let dump = analysis.tree.dump();

    assert!(dump.starts_with("scope 0 [root]\n"));
    assert!(dump.contains("  var g: int @ 0($gp)\n"));
    assert!(dump.contains("  func main() -> void as main\n"));
    assert!(dump.contains("  scope 1 [formals of main]\n"));
    assert!(dump.contains("    scope 2 [body of main]\n"));
    assert!(dump.contains("      var x: int @ 4($gp)\n"));
}

#[test]
fn test_label_counter() {
    let mut ctx = CompilationContext::new(CompileOptions::default());
    assert_eq!(ctx.next_label(), 0);
    assert_eq!(ctx.next_label(), 1);
    assert_eq!(ctx.allocate_static(), 0);
    assert_eq!(ctx.allocate_static(), 4);
    assert_eq!(ctx.static_size(), 8);
}
