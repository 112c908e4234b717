use crate::{
    ast::{
        ast::{Expr, Stmt},
        statements::{ForStmt, IfStmt, StmtKind, WhileStmt},
    },
    errors::errors::{Error, ErrorImpl},
    semantic::scope::Type,
    Position,
};

use super::{
    codegen::{internal_error, CodeGenerator},
    expr::{gen_expression, gen_value},
    runtime,
};

/// Generates code for the given statement.
///
/// Statements are balanced: the shadow stack has the same depth before and
/// after, which is checked here.
pub fn gen_statement(generator: &mut CodeGenerator, stmt: &Stmt) -> Result<(), Error> {
    let depth = generator.shadow.len();
    let position = &stmt.span.start;

    match &stmt.kind {
        StmtKind::VarDecl(_) | StmtKind::Empty => {}
        StmtKind::Expression(expr) => gen_discarded(generator, expr)?,
        StmtKind::Block(block) => {
            for stmt in &block.body {
                gen_statement(generator, stmt)?;
            }
        }
        StmtKind::If(stmt) => gen_if(generator, stmt)?,
        StmtKind::While(stmt) => gen_while(generator, stmt)?,
        StmtKind::For(stmt) => gen_for(generator, stmt)?,
        StmtKind::Break => {
            let (_, end) = innermost_loop(generator, "break", position)?;
            generator.emit(format!("j {}", end));
        }
        StmtKind::Continue => {
            let (next, _) = innermost_loop(generator, "continue", position)?;
            generator.emit(format!("j {}", next));
        }
        StmtKind::Return(value) => gen_return(generator, value.as_ref(), position)?,
        StmtKind::Print(arguments) => gen_print(generator, arguments)?,
    }

    if generator.shadow.len() != depth {
        return Err(internal_error(
            "statement left the shadow stack unbalanced",
            position,
        ));
    }

    Ok(())
}

/// Evaluates an expression for its side effects only.
fn gen_discarded(generator: &mut CodeGenerator, expr: &Expr) -> Result<(), Error> {
    let depth = generator.shadow.len();
    gen_expression(generator, expr)?;
    let pushed = generator.shadow.len() - depth;
    generator.discard(pushed, &expr.span.start)
}

/// Evaluates a branch or loop condition into `$t0`.
fn gen_condition(generator: &mut CodeGenerator, condition: &Expr) -> Result<(), Error> {
    let type_ = gen_value(generator, condition)?;
    if type_ != Type::Bool {
        return Err(Error::new(
            ErrorImpl::ConditionNotBool {
                received: type_.to_string(),
            },
            condition.span.start.clone(),
        ));
    }
    generator.pop("$t0", &condition.span.start)?;
    Ok(())
}

fn innermost_loop(
    generator: &CodeGenerator,
    keyword: &str,
    position: &Position,
) -> Result<(String, String), Error> {
    generator.loops.last().cloned().ok_or_else(|| {
        Error::new(
            ErrorImpl::OutsideOfLoop {
                keyword: keyword.to_string(),
            },
            position.clone(),
        )
    })
}

fn gen_if(generator: &mut CodeGenerator, stmt: &IfStmt) -> Result<(), Error> {
    let n = generator.ctx.next_label();
    let else_label = format!("else_{}", n);
    let end_label = format!("end_if_{}", n);

    gen_condition(generator, &stmt.condition)?;
    generator.emit(format!("beqz $t0, {}", else_label));
    gen_statement(generator, &stmt.then_body)?;
    generator.emit(format!("j {}", end_label));
    generator.emit_label(&else_label);
    if let Some(else_body) = &stmt.else_body {
        gen_statement(generator, else_body)?;
    }
    generator.emit_label(&end_label);

    Ok(())
}

fn gen_while(generator: &mut CodeGenerator, stmt: &WhileStmt) -> Result<(), Error> {
    let n = generator.ctx.next_label();
    let start_label = format!("start_while_{}", n);
    let end_label = format!("end_while_{}", n);

    generator.emit_label(&start_label);
    gen_condition(generator, &stmt.condition)?;
    generator.emit(format!("beqz $t0, {}", end_label));

    generator
        .loops
        .push((start_label.clone(), end_label.clone()));
    gen_statement(generator, &stmt.body)?;
    generator.loops.pop();

    generator.emit(format!("j {}", start_label));
    generator.emit_label(&end_label);

    Ok(())
}

/// Absent clauses emit nothing: no condition means the loop only ends
/// through `break` or `return`.
fn gen_for(generator: &mut CodeGenerator, stmt: &ForStmt) -> Result<(), Error> {
    let n = generator.ctx.next_label();
    let start_label = format!("start_for_{}", n);
    let continue_label = format!("continue_for_{}", n);
    let end_label = format!("end_for_{}", n);

    if let Some(init) = &stmt.init {
        gen_discarded(generator, init)?;
    }

    generator.emit_label(&start_label);
    if let Some(condition) = &stmt.condition {
        gen_condition(generator, condition)?;
        generator.emit(format!("beqz $t0, {}", end_label));
    }

    generator
        .loops
        .push((continue_label.clone(), end_label.clone()));
    gen_statement(generator, &stmt.body)?;
    generator.loops.pop();

    generator.emit_label(&continue_label);
    if let Some(update) = &stmt.update {
        gen_discarded(generator, update)?;
    }
    generator.emit(format!("j {}", start_label));
    generator.emit_label(&end_label);

    Ok(())
}

fn gen_return(
    generator: &mut CodeGenerator,
    value: Option<&Expr>,
    position: &Position,
) -> Result<(), Error> {
    let function = generator
        .current_function
        .clone()
        .ok_or_else(|| internal_error("return outside of a function", position))?;

    let mismatch = |received: &Type| {
        Error::new(
            ErrorImpl::ReturnTypeMismatch {
                expected: function.return_type.to_string(),
                received: received.to_string(),
            },
            position.clone(),
        )
    };

    match value {
        Some(value) => {
            let type_ = gen_value(generator, value)?;
            if function.return_type == Type::Void || !function.return_type.accepts(&type_) {
                return Err(mismatch(&type_));
            }
            generator.pop("$v0", position)?;
        }
        None if function.return_type != Type::Void => return Err(mismatch(&Type::Void)),
        None => {}
    }

    generator.emit(format!("j {}", function.end_label()));
    Ok(())
}

/// Prints every argument in order, then a newline.
fn gen_print(generator: &mut CodeGenerator, arguments: &[Expr]) -> Result<(), Error> {
    for argument in arguments {
        let position = &argument.span.start;
        let type_ = gen_value(generator, argument)?;
        match type_ {
            Type::Int => {
                generator.pop("$a0", position)?;
                generator.emit("li $v0, 1");
                generator.emit("syscall");
            }
            Type::Double => {
                generator.pop_float("$f12", position)?;
                generator.emit("li $v0, 2");
                generator.emit("syscall");
            }
            Type::String => {
                generator.pop("$a0", position)?;
                generator.emit("li $v0, 4");
                generator.emit("syscall");
            }
            Type::Bool => {
                generator.pop("$a0", position)?;
                generator.emit(format!("jal {}", runtime::PRINT_BOOL));
            }
            other => {
                return Err(Error::new(
                    ErrorImpl::NotPrintable {
                        type_: other.to_string(),
                    },
                    position.clone(),
                ))
            }
        }
    }

    generator.emit("li $a0, 10");
    generator.emit("li $v0, 11");
    generator.emit("syscall");
    Ok(())
}
