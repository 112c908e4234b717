//! Unit tests for the parser module.
//!
//! This module contains tests for parsing the language constructs:
//! - Global, formal and local declarations
//! - Functions and classes
//! - Expressions and precedence
//! - Control flow statements, including every `for` clause shape

use std::rc::Rc;

use crate::{
    ast::{
        ast::{ClassMember, Decl, Program, Stmt},
        expressions::{BinaryOp, ExprKind, PrefixOp},
        statements::StmtKind,
        types::TypeSyntax,
    },
    errors::errors::Error,
    lexer::lexer::tokenize,
};

use super::parser::parse;

fn parse_source(source: &str) -> Result<Program, Error> {
    let tokens = tokenize(source.to_string(), Some("test.decaf".to_string()))?;
    parse(tokens, Rc::new("test.decaf".to_string()))
}

/// Parses `body` inside `void main() { ... }` and returns its statements.
fn parse_body(body: &str) -> Vec<Stmt> {
    let program = parse_source(&format!("void main() {{ {} }}", body)).unwrap();
    match program.decls.into_iter().next() {
        Some(Decl::Function(main)) => main.body.body,
        other => panic!("expected main, got {:?}", other),
    }
}

fn expression_of(stmt: &Stmt) -> &ExprKind {
    match &stmt.kind {
        StmtKind::Expression(expr) => &expr.kind,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_parse_global_variable() {
    let program = parse_source("int x; string[] names;").unwrap();

    assert_eq!(program.decls.len(), 2);
    match &program.decls[1] {
        Decl::Variable(decl) => {
            assert_eq!(decl.name, "names");
            assert!(decl.type_.is_array());
            assert_eq!(decl.type_.to_string(), "string[]");
        }
        other => panic!("expected variable, got {:?}", other),
    }
}

#[test]
fn test_parse_function_declaration() {
    let program = parse_source("int add(int a, int b) { return a + b; }").unwrap();

    match &program.decls[0] {
        Decl::Function(decl) => {
            assert_eq!(decl.name, "add");
            assert_eq!(decl.formals.len(), 2);
            assert_eq!(decl.formals[1].name, "b");
            assert!(matches!(&decl.return_type, Some(TypeSyntax::Named { name, .. }) if name == "int"));
            assert_eq!(decl.body.body.len(), 1);
        }
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn test_parse_void_function() {
    let program = parse_source("void main() { }").unwrap();

    match &program.decls[0] {
        Decl::Function(decl) => {
            assert!(decl.return_type.is_none());
            assert!(decl.formals.is_empty());
        }
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn test_parse_class_declaration() {
    let source = "class Point { int x; int y; int sum() { return x + y; } void reset() { x = 0; } }";
    let program = parse_source(source).unwrap();

    match &program.decls[0] {
        Decl::Class(class) => {
            assert_eq!(class.name, "Point");
            assert_eq!(class.members.len(), 4);
            assert!(matches!(&class.members[0], ClassMember::Variable(v) if v.name == "x"));
            assert!(matches!(&class.members[2], ClassMember::Method(m) if m.name == "sum"));
            assert!(matches!(&class.members[3], ClassMember::Method(m) if m.return_type.is_none()));
        }
        other => panic!("expected class, got {:?}", other),
    }
}

#[test]
fn test_parse_local_declarations() {
    let body = parse_body("int x; Point p; Point[] ps; x = 1;");

    assert!(matches!(&body[0].kind, StmtKind::VarDecl(decl) if decl.name == "x"));
    assert!(matches!(&body[1].kind, StmtKind::VarDecl(decl) if decl.name == "p"));
    assert!(matches!(&body[2].kind, StmtKind::VarDecl(decl) if decl.type_.is_array()));
    assert!(matches!(expression_of(&body[3]), ExprKind::Assignment(_)));
}

#[test]
fn test_parse_precedence() {
    let body = parse_body("1 + 2 * 3;");

    match expression_of(&body[0]) {
        ExprKind::Binary(binary) => {
            assert_eq!(binary.operator, BinaryOp::Add);
            assert!(matches!(&binary.right.kind, ExprKind::Binary(inner) if inner.operator == BinaryOp::Multiply));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_parse_logical_precedence() {
    // && binds tighter than ||, equality tighter than &&
    let body = parse_body("a || b && c == d;");

    match expression_of(&body[0]) {
        ExprKind::Binary(binary) => {
            assert_eq!(binary.operator, BinaryOp::Or);
            match &binary.right.kind {
                ExprKind::Binary(and) => {
                    assert_eq!(and.operator, BinaryOp::And);
                    assert!(matches!(&and.right.kind, ExprKind::Binary(eq) if eq.operator == BinaryOp::Equals));
                }
                other => panic!("expected &&, got {:?}", other),
            }
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_parse_left_associative_subtraction() {
    let body = parse_body("a - b - c;");

    match expression_of(&body[0]) {
        ExprKind::Binary(binary) => {
            assert_eq!(binary.operator, BinaryOp::Subtract);
            assert!(matches!(&binary.left.kind, ExprKind::Binary(_)));
            assert!(matches!(&binary.right.kind, ExprKind::Identifier(name) if name == "c"));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_parse_right_associative_assignment() {
    let body = parse_body("a = b = 3;");

    match expression_of(&body[0]) {
        ExprKind::Assignment(assignment) => {
            assert!(matches!(&assignment.assignee.kind, ExprKind::Identifier(name) if name == "a"));
            assert!(matches!(&assignment.value.kind, ExprKind::Assignment(_)));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn test_parse_unary_binds_tighter_than_binary() {
    let body = parse_body("-a + b; !x && y;");

    match expression_of(&body[0]) {
        ExprKind::Binary(binary) => {
            assert!(matches!(&binary.left.kind, ExprKind::Prefix(p) if p.operator == PrefixOp::Negate));
        }
        other => panic!("expected binary, got {:?}", other),
    }
    match expression_of(&body[1]) {
        ExprKind::Binary(binary) => {
            assert!(matches!(&binary.left.kind, ExprKind::Prefix(p) if p.operator == PrefixOp::Not));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_parse_calls_members_and_indexing() {
    let body = parse_body("f(1, x); p.move(2); p.x; a[i + 1]; a.length(); p.q.r(3);");

    assert!(matches!(expression_of(&body[0]), ExprKind::Call(call) if call.receiver.is_none() && call.arguments.len() == 2));
    assert!(matches!(expression_of(&body[1]), ExprKind::Call(call) if call.receiver.is_some() && call.name == "move"));
    assert!(matches!(expression_of(&body[2]), ExprKind::Field(field) if field.name == "x"));
    assert!(matches!(expression_of(&body[3]), ExprKind::Index(_)));
    assert!(matches!(expression_of(&body[4]), ExprKind::Call(call) if call.name == "length" && call.arguments.is_empty()));
    match expression_of(&body[5]) {
        ExprKind::Call(call) => {
            assert_eq!(call.name, "r");
            assert!(matches!(&call.receiver.as_ref().unwrap().kind, ExprKind::Field(field) if field.name == "q"));
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn test_parse_builtins() {
    let body = parse_body("x = ReadInteger(); s = ReadLine(); a = NewArray(5, int[]); p = new Point; d = itod(3);");

    let values: Vec<&ExprKind> = body
        .iter()
        .map(|stmt| match expression_of(stmt) {
            ExprKind::Assignment(assignment) => &assignment.value.kind,
            other => panic!("expected assignment, got {:?}", other),
        })
        .collect();

    assert!(matches!(values[0], ExprKind::ReadInteger));
    assert!(matches!(values[1], ExprKind::ReadLine));
    assert!(matches!(values[2], ExprKind::NewArray(array) if array.element_type.to_string() == "int[]"));
    assert!(matches!(values[3], ExprKind::NewObject(name) if name == "Point"));
    assert!(matches!(values[4], ExprKind::Conversion(_)));
}

#[test]
fn test_parse_literals() {
    let body = parse_body("1; 0x10; 2.5; \"hi\"; true; false; null; this;");

    assert!(matches!(expression_of(&body[0]), ExprKind::IntLiteral(1)));
    assert!(matches!(expression_of(&body[1]), ExprKind::IntLiteral(16)));
    assert!(matches!(expression_of(&body[2]), ExprKind::DoubleLiteral(value) if *value == 2.5));
    assert!(matches!(expression_of(&body[3]), ExprKind::StringLiteral(value) if value == "hi"));
    assert!(matches!(expression_of(&body[4]), ExprKind::BoolLiteral(true)));
    assert!(matches!(expression_of(&body[5]), ExprKind::BoolLiteral(false)));
    assert!(matches!(expression_of(&body[6]), ExprKind::Null));
    assert!(matches!(expression_of(&body[7]), ExprKind::This));
}

#[test]
fn test_parse_if_else_and_while() {
    let body = parse_body("if (x > 0) Print(x); else { x = 1; } while (x < 10) x = x + 1;");

    match &body[0].kind {
        StmtKind::If(stmt) => {
            assert!(matches!(stmt.then_body.kind, StmtKind::Print(_)));
            assert!(matches!(stmt.else_body.as_ref().unwrap().kind, StmtKind::Block(_)));
        }
        other => panic!("expected if, got {:?}", other),
    }
    assert!(matches!(&body[1].kind, StmtKind::While(_)));
}

#[test]
fn test_parse_for_shapes() {
    let body = parse_body(
        "for (;;) break; for (i = 0; i < 3;) i = i + 1; for (; i < 3; i = i + 1) ; for (i = 0; i < 3; i = i + 1) { }",
    );

    let shapes: Vec<(bool, bool, bool)> = body
        .iter()
        .map(|stmt| match &stmt.kind {
            StmtKind::For(stmt) => (
                stmt.init.is_some(),
                stmt.condition.is_some(),
                stmt.update.is_some(),
            ),
            other => panic!("expected for, got {:?}", other),
        })
        .collect();

    assert_eq!(
        shapes,
        vec![
            (false, false, false),
            (true, true, false),
            (false, true, true),
            (true, true, true),
        ]
    );
}

#[test]
fn test_parse_return_break_continue_print() {
    let body = parse_body("return; return 1; break; continue; Print(1, \"a\", true);");

    assert!(matches!(&body[0].kind, StmtKind::Return(None)));
    assert!(matches!(&body[1].kind, StmtKind::Return(Some(_))));
    assert!(matches!(&body[2].kind, StmtKind::Break));
    assert!(matches!(&body[3].kind, StmtKind::Continue));
    assert!(matches!(&body[4].kind, StmtKind::Print(args) if args.len() == 3));
}

#[test]
fn test_node_ids_are_unique() {
    let body = parse_body("a = b + c; Print(a);");
    let mut ids = vec![body[0].id, body[1].id];
    if let ExprKind::Assignment(assignment) = expression_of(&body[0]) {
        ids.push(assignment.assignee.id);
        ids.push(assignment.value.id);
    }
    let count = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), count);
    assert!(ids.iter().all(|id| *id >= 1024));
}

#[test]
fn test_parse_missing_semicolon() {
    let error = parse_source("void main() { x = 1 }").unwrap_err();
    assert_eq!(error.get_error_name(), "UnexpectedTokenDetailed");
    assert!(!error.is_semantic());
}

#[test]
fn test_parse_unclosed_block() {
    assert!(parse_source("void main() { x = 1;").is_err());
}

#[test]
fn test_parse_call_on_literal_is_rejected() {
    assert!(parse_source("void main() { 3(4); }").is_err());
}

#[test]
fn test_parse_void_variable_is_rejected() {
    assert!(parse_source("void x;").is_err());
}

#[test]
fn test_parse_empty_program_is_rejected() {
    assert!(parse_source("").is_err());
}

#[test]
fn test_parse_integer_overflow() {
    let error = parse_source("void main() { x = 99999999999; }").unwrap_err();
    assert_eq!(error.get_error_name(), "NumberParseError");
}
