//! Unit tests for the code generation module.
//!
//! This module contains tests for:
//! - Shadow stack bookkeeping
//! - The operand type rules of every operator
//! - Control-flow label allocation and `break`/`continue` targets
//! - Calling-convention layout
//! - Semantic errors raised during generation

use std::{collections::HashSet, rc::Rc};

use crate::{
    ast::{
        ast::{Decl, Program},
        expressions::{BinaryOp, Conversion, PrefixOp},
        statements::StmtKind,
    },
    driver::options::{CompileOptions, LocalStorage},
    emulator::emulator::run,
    errors::errors::{Error, ErrorImpl},
    lexer::lexer::tokenize,
    parser::parser::parse,
    semantic::{
        context::CompilationContext,
        scope::Type,
        scope_builder::{build_scopes, ScopeAnalysis},
    },
};

use super::{
    codegen::{escape_asciiz, generate, CodeGenerator},
    expr::{binary_result_type, conversion_types, gen_expression, prefix_result_type},
};

fn parse_source(source: &str) -> Program {
    let tokens = tokenize(source.to_string(), Some("test.decaf".to_string())).unwrap();
    parse(tokens, Rc::new("test.decaf".to_string())).unwrap()
}

fn compile_with(source: &str, options: CompileOptions) -> Result<String, Error> {
    let program = parse_source(source);
    let mut ctx = CompilationContext::new(options);
    let analysis = build_scopes(&program, &mut ctx)?;
    generate(&program, &analysis, &mut ctx)
}

fn compile(source: &str) -> Result<String, Error> {
    compile_with(source, CompileOptions::default())
}

fn compile_main(body: &str) -> Result<String, Error> {
    compile(&format!("void main() {{ {} }}", body))
}

fn error_of(source: &str) -> ErrorImpl {
    compile(source).unwrap_err().get_kind().clone()
}

fn main_error(body: &str) -> ErrorImpl {
    compile_main(body).unwrap_err().get_kind().clone()
}

/// The instructions between `label:` and the next line starting with `until`.
fn section<'a>(assembly: &'a str, label: &str, until: &str) -> Vec<&'a str> {
    assembly
        .lines()
        .skip_while(|line| *line != format!("{}:", label))
        .skip(1)
        .take_while(|line| !line.starts_with(until))
        .collect()
}

#[test]
fn test_expression_pushes_exactly_one_value() {
    let program = parse_source(
        "int f(int a, int b) { return a; }
         void main() { int x; x = 1 + 2 * f(3, 4) - (5 % 2) + -x; }",
    );
    let mut ctx = CompilationContext::new(CompileOptions::default());
    let analysis: ScopeAnalysis = build_scopes(&program, &mut ctx).unwrap();

    let Decl::Function(main) = &program.decls[1] else {
        panic!("expected main");
    };
    let StmtKind::Expression(expr) = &main.body.body[1].kind else {
        panic!("expected an expression statement");
    };

    let mut generator = CodeGenerator::new(&analysis, &mut ctx);
    gen_expression(&mut generator, expr).unwrap();
    assert_eq!(generator.shadow, vec![Type::Bool]);
}

#[test]
fn test_void_call_pushes_nothing() {
    let program = parse_source("void f() {} void main() { f(); }");
    let mut ctx = CompilationContext::new(CompileOptions::default());
    let analysis = build_scopes(&program, &mut ctx).unwrap();

    let Decl::Function(main) = &program.decls[1] else {
        panic!("expected main");
    };
    let StmtKind::Expression(expr) = &main.body.body[0].kind else {
        panic!("expected an expression statement");
    };

    let mut generator = CodeGenerator::new(&analysis, &mut ctx);
    gen_expression(&mut generator, expr).unwrap();
    assert!(generator.shadow.is_empty());
    assert!(generator.text().contains("jal func.f"));
}

#[test]
fn test_binary_type_rules() {
    let basics = [Type::Int, Type::Double, Type::Bool, Type::String];
    let allowed: [(BinaryOp, &[(Type, Type)], Option<Type>); 6] = [
        (
            BinaryOp::Subtract,
            &[(Type::Int, Type::Int), (Type::Double, Type::Double)],
            None,
        ),
        (BinaryOp::Modulo, &[(Type::Int, Type::Int)], Some(Type::Int)),
        (
            BinaryOp::Less,
            &[(Type::Int, Type::Int), (Type::Double, Type::Double)],
            Some(Type::Bool),
        ),
        (
            BinaryOp::Equals,
            &[
                (Type::Int, Type::Int),
                (Type::Double, Type::Double),
                (Type::Bool, Type::Bool),
                (Type::String, Type::String),
            ],
            Some(Type::Bool),
        ),
        (BinaryOp::And, &[(Type::Bool, Type::Bool)], Some(Type::Bool)),
        (
            BinaryOp::Add,
            &[
                (Type::Int, Type::Int),
                (Type::Double, Type::Double),
                (Type::String, Type::String),
            ],
            None,
        ),
    ];

    for (operator, pairs, fixed) in allowed {
        for left in &basics {
            for right in &basics {
                let result = binary_result_type(operator, left, right);
                let valid = pairs.iter().any(|(l, r)| l == left && r == right);
                assert_eq!(
                    result.is_some(),
                    valid,
                    "{} {} {}",
                    left,
                    operator,
                    right
                );
                if valid {
                    let expected = fixed.clone().unwrap_or_else(|| left.clone());
                    assert_eq!(result, Some(expected));
                }
            }
        }
    }
}

#[test]
fn test_reference_equality_rules() {
    let class = Type::Class(crate::semantic::scope::ClassRef {
        id: 0,
        name: Rc::from("Point"),
    });
    let array = Type::Array(Box::new(Type::Int));

    assert_eq!(
        binary_result_type(BinaryOp::Equals, &class, &Type::Null),
        Some(Type::Bool)
    );
    assert_eq!(
        binary_result_type(BinaryOp::NotEquals, &Type::Null, &array),
        Some(Type::Bool)
    );
    assert_eq!(binary_result_type(BinaryOp::Equals, &class, &array), None);
    assert_eq!(binary_result_type(BinaryOp::Less, &class, &class), None);
}

#[test]
fn test_prefix_and_conversion_rules() {
    assert_eq!(prefix_result_type(PrefixOp::Negate, &Type::Int), Some(Type::Int));
    assert_eq!(
        prefix_result_type(PrefixOp::Negate, &Type::Double),
        Some(Type::Double)
    );
    assert_eq!(prefix_result_type(PrefixOp::Negate, &Type::Bool), None);
    assert_eq!(prefix_result_type(PrefixOp::Not, &Type::Bool), Some(Type::Bool));
    assert_eq!(prefix_result_type(PrefixOp::Not, &Type::Int), None);

    assert_eq!(conversion_types(Conversion::Itod), (Type::Int, Type::Double));
    assert_eq!(conversion_types(Conversion::Dtoi), (Type::Double, Type::Int));
    assert_eq!(conversion_types(Conversion::Itob), (Type::Int, Type::Bool));
    assert_eq!(conversion_types(Conversion::Btoi), (Type::Bool, Type::Int));
}

#[test]
fn test_operator_errors() {
    assert!(matches!(
        main_error("int x; x = 1 + 2.0;"),
        ErrorImpl::InvalidOperands { .. }
    ));
    assert!(matches!(
        main_error("double d; d = 1.5 % 2.0;"),
        ErrorImpl::InvalidOperands { .. }
    ));
    assert!(matches!(
        main_error("bool b; b = true < false;"),
        ErrorImpl::InvalidOperands { .. }
    ));
    assert!(matches!(
        main_error("bool b; b = -true;"),
        ErrorImpl::InvalidOperand { .. }
    ));
    assert!(matches!(
        main_error("bool b; b = !1;"),
        ErrorImpl::InvalidOperand { .. }
    ));
    assert!(matches!(
        main_error("int x; x = dtoi(3);"),
        ErrorImpl::TypeMatchError { .. }
    ));
}

#[test]
fn test_assignment_rules() {
    assert!(compile_main("int x; bool b; b = x = 3;").is_ok());
    assert!(matches!(
        main_error("int x; x = \"no\";"),
        ErrorImpl::TypeMatchError { .. }
    ));
    assert!(matches!(main_error("3 = 4;"), ErrorImpl::NotAssignable));
    assert!(matches!(
        main_error("int x; x = y;"),
        ErrorImpl::VariableNotDeclared { .. }
    ));
}

#[test]
fn test_loop_labels_are_unique() {
    let assembly = compile_main(
        "int i; int j;
         while (i < 2) { while (j < 2) { j = j + 1; } i = i + 1; }
         for (i = 0; i < 2; i = i + 1) { for (j = 0; j < 2; j = j + 1) { } }
         if (i == j) { } else { }
         if (i != j) { }",
    )
    .unwrap();

    let labels: Vec<&str> = assembly
        .lines()
        .filter(|line| !line.starts_with('\t') && line.ends_with(':'))
        .collect();
    let unique: HashSet<&str> = labels.iter().copied().collect();
    assert_eq!(labels.len(), unique.len(), "duplicate labels in {:?}", labels);

    for label in [
        "start_while_0:",
        "start_while_1:",
        "start_for_2:",
        "continue_for_3:",
        "else_4:",
        "end_if_5:",
    ] {
        assert!(labels.contains(&label), "missing {}", label);
    }
}

#[test]
fn test_break_and_continue_target_innermost_loop() {
    let assembly = compile_main(
        "bool a; a = true;
         while (a) { for (;;) { break; } continue; }",
    )
    .unwrap();

    let inner = section(&assembly, "start_for_1", "continue_for_1");
    assert_eq!(inner, vec!["\tj end_for_1"]);

    let jumps_to_while = assembly
        .lines()
        .filter(|line| *line == "\tj start_while_0")
        .count();
    assert_eq!(jumps_to_while, 2);
}

#[test]
fn test_for_clause_shapes() {
    let shapes = [
        ("for (;;) { break; }", false, false),
        ("for (i = 0; i < 3;) { i = i + 1; }", true, false),
        ("for (; i < 3; i = i + 1) ;", true, true),
        ("for (i = 0; i < 3; i = i + 1) ;", true, true),
    ];

    for (shape, has_condition, has_update) in shapes {
        let assembly = compile_main(&format!("int i; {}", shape)).unwrap();

        assert_eq!(
            assembly.contains("beqz $t0, end_for_0"),
            has_condition,
            "{}",
            shape
        );
        let update = section(&assembly, "continue_for_0", "\tj start_for_0");
        assert_eq!(!update.is_empty(), has_update, "{}", shape);
        assert!(assembly.contains("end_for_0:\n"), "{}", shape);
    }
}

#[test]
fn test_control_flow_errors() {
    assert!(matches!(
        main_error("break;"),
        ErrorImpl::OutsideOfLoop { .. }
    ));
    assert!(matches!(
        main_error("if (true) { continue; }"),
        ErrorImpl::OutsideOfLoop { .. }
    ));
    assert!(matches!(
        main_error("if (1) { }"),
        ErrorImpl::ConditionNotBool { .. }
    ));
    assert!(matches!(
        main_error("while (\"s\") { }"),
        ErrorImpl::ConditionNotBool { .. }
    ));
    assert!(matches!(
        main_error("for (; 2;) { }"),
        ErrorImpl::ConditionNotBool { .. }
    ));
}

#[test]
fn test_call_errors() {
    let functions = "int add(int a, int b) { return a + b; } void nothing() { }";

    assert!(matches!(
        error_of(&format!("{} void main() {{ add(1); }}", functions)),
        ErrorImpl::MissingArguments {
            expected: 2,
            received: 1
        }
    ));
    assert!(matches!(
        error_of(&format!("{} void main() {{ add(1, 2, 3); }}", functions)),
        ErrorImpl::UnexpectedArguments {
            expected: 2,
            received: 3
        }
    ));
    assert!(matches!(
        error_of(&format!("{} void main() {{ add(1, true); }}", functions)),
        ErrorImpl::ArgumentTypeMatchError { .. }
    ));
    assert!(matches!(
        error_of(&format!("{} void main() {{ int x; x = nothing(); }}", functions)),
        ErrorImpl::VoidValue
    ));
    assert!(matches!(
        error_of("void main() { missing(); }"),
        ErrorImpl::FunctionNotDeclared { .. }
    ));
}

#[test]
fn test_return_errors() {
    assert!(matches!(
        error_of("int f() { return true; } void main() { }"),
        ErrorImpl::ReturnTypeMismatch { .. }
    ));
    assert!(matches!(
        error_of("int f() { return; } void main() { }"),
        ErrorImpl::ReturnTypeMismatch { .. }
    ));
    assert!(matches!(
        error_of("void f() { return 1; } void main() { }"),
        ErrorImpl::ReturnTypeMismatch { .. }
    ));
}

#[test]
fn test_print_rules() {
    assert!(compile_main("Print(1, 2.5, \"s\", true);").is_ok());
    assert!(matches!(
        compile("class A { } void main() { A a; Print(a); }")
            .unwrap_err()
            .get_kind(),
        ErrorImpl::NotPrintable { .. }
    ));
}

#[test]
fn test_array_size_rules() {
    assert!(compile_main("int[] a; a = NewArray(4, int);").is_ok());
    assert!(matches!(
        main_error("int[] a; a = NewArray(0, int);"),
        ErrorImpl::InvalidArraySize { .. }
    ));
    assert!(matches!(
        main_error("int[] a; a = NewArray(-3, int);"),
        ErrorImpl::InvalidArraySize { .. }
    ));
    assert!(matches!(
        main_error("int n; int[] a; a = NewArray(n, int);"),
        ErrorImpl::InvalidArraySize { .. }
    ));
    assert!(matches!(
        main_error("int[] a; a = NewArray(true, int);"),
        ErrorImpl::InvalidArraySize { .. }
    ));

    let mut options = CompileOptions::default();
    options.capabilities.dynamic_array_sizes = true;
    assert!(compile_with("void main() { int n; int[] a; a = NewArray(n, int); }", options).is_ok());
    assert!(matches!(
        compile_with("void main() { int[] a; a = NewArray(0, int); }", options)
            .unwrap_err()
            .get_kind(),
        ErrorImpl::InvalidArraySize { .. }
    ));
}

#[test]
fn test_member_errors() {
    let class = "class P { int x; int get() { return x; } }";
    assert!(compile(&format!("{} void main() {{ P p; p = new P; p.x = p.get(); }}", class)).is_ok());
    assert!(matches!(
        error_of(&format!("{} void main() {{ P p; p.y = 1; }}", class)),
        ErrorImpl::UnknownMember { .. }
    ));
    assert!(matches!(
        error_of(&format!("{} void main() {{ P p; p.nope(); }}", class)),
        ErrorImpl::UnknownMember { .. }
    ));
    assert!(matches!(
        error_of("void main() { int x; x.y = 1; }"),
        ErrorImpl::UnknownMember { .. }
    ));
    assert!(matches!(
        error_of("void main() { int[] a; int n; n = a.size(); }"),
        ErrorImpl::UnknownMember { .. }
    ));
    assert!(matches!(
        error_of("void main() { int x; x = new Q; }"),
        ErrorImpl::UnknownType { .. }
    ));
}

#[test]
fn test_function_layout() {
    let assembly = compile(
        "int add(int a, int b) { return a + b; }
         void main() { Print(add(1, 2)); }",
    )
    .unwrap();

    let prologue = section(&assembly, "func.add", "\tmove $fp");
    assert_eq!(prologue[0], "\tsubu $sp, $sp, 40");
    assert!(prologue.contains(&"\tsw $s7, 28($sp)"));
    assert!(prologue.contains(&"\tsw $fp, 32($sp)"));
    assert!(prologue.contains(&"\tsw $ra, 36($sp)"));

    // `a` is the deeper of the two actuals
    assert!(assembly.contains("\tlw $t0, 44($fp)\n\tsw $t0, 0($gp)"));
    assert!(assembly.contains("\tlw $t0, 40($fp)\n\tsw $t0, 4($gp)"));

    assert!(assembly.contains("\tjal func.add\n\taddu $sp, $sp, 8\n"));
    assert!(assembly.contains("func.add.end:\n\tmove $sp, $fp\n"));
    assert!(assembly.contains("main.end:\n\tli $v0, 10\n\tsyscall\n"));
    assert!(assembly.starts_with("\t.text\n\t.globl main\n"));
}

#[test]
fn test_frame_locals() {
    let options = CompileOptions {
        local_storage: LocalStorage::Frame,
        ..CompileOptions::default()
    };
    let assembly = compile_with(
        "int f(int a) { int b; b = a; return b; } void main() { Print(f(1)); }",
        options,
    )
    .unwrap();

    assert!(assembly.contains("\tmove $fp, $sp\n\tsubu $sp, $sp, 8\n"));
    assert!(assembly.contains("\tlw $t0, 40($fp)\n\tsw $t0, -4($fp)"));
    assert!(assembly.contains("\tsw $t0, -8($fp)"));
}

#[test]
fn test_string_literals_go_to_data() {
    let assembly = compile_main("Print(\"a\\tb\"); Print(\"a\\tb\");").unwrap();

    assert!(assembly.contains("str_0:\t.asciiz \"a\\tb\""));
    assert!(assembly.contains("str_1:\t.asciiz \"a\\tb\""));
    assert!(assembly.contains("\tla $a0, str_0\n\tjal _rt_strdup"));
    assert_eq!(escape_asciiz("say \"hi\"\n"), "say \\\"hi\\\"\\n");
}

/// Every label the assembly defines, in order.
fn defined_labels(assembly: &str) -> Vec<&str> {
    assembly
        .lines()
        .filter(|line| !line.starts_with('\t'))
        .filter_map(|line| line.split(':').next())
        .collect()
}

fn assert_labels_unique(assembly: &str) {
    let labels = defined_labels(assembly);
    let unique: HashSet<_> = labels.iter().collect();
    assert_eq!(unique.len(), labels.len(), "duplicate label in {:?}", labels);
}

#[test]
fn test_function_named_like_an_epilogue() {
    let assembly =
        compile("void f() { Print(1); } void f_end() { Print(2); } void main() { f(); f_end(); }")
            .unwrap();

    assert!(assembly.contains("\nfunc.f:\n"));
    assert!(assembly.contains("\nfunc.f.end:\n"));
    assert!(assembly.contains("\nfunc.f_end:\n"));
    assert_labels_unique(&assembly);
    assert_eq!(run(&assembly, "").unwrap().output, "1\n2\n");
}

#[test]
fn test_class_and_method_names_with_underscores() {
    let assembly = compile(
        "class A_b { int c() { return 1; } }
         class A { int b_c() { return 2; } }
         void main() {
             A_b x;
             A y;
             x = new A_b;
             y = new A;
             Print(x.c(), y.b_c());
         }",
    )
    .unwrap();

    assert!(assembly.contains("\nmethod.A_b.c:\n"));
    assert!(assembly.contains("\nmethod.A.b_c:\n"));
    assert_labels_unique(&assembly);
    assert_eq!(run(&assembly, "").unwrap().output, "12\n");
}
