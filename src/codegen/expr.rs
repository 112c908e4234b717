use std::rc::Rc;

use crate::{
    ast::{
        ast::Expr,
        expressions::{
            AssignmentExpr, BinaryExpr, BinaryOp, CallExpr, Conversion, ConversionExpr, ExprKind,
            FieldExpr, IndexExpr, NewArrayExpr, PrefixExpr, PrefixOp,
        },
    },
    errors::errors::{Error, ErrorImpl},
    semantic::scope::{ScopeId, Storage, Type, Variable},
    Position,
};

use super::{
    codegen::{internal_error, CodeGenerator},
    runtime,
};

/// Bit pattern of `0.5f32`, used by `dtoi` rounding.
const HALF: i32 = 0x3f00_0000;

/// The result type of `left <op> right`, or `None` when the operands are invalid.
pub fn binary_result_type(operator: BinaryOp, left: &Type, right: &Type) -> Option<Type> {
    use Type::*;

    match operator {
        BinaryOp::Add => match (left, right) {
            (Int, Int) => Some(Int),
            (Double, Double) => Some(Double),
            (String, String) => Some(String),
            _ => None,
        },
        BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => match (left, right) {
            (Int, Int) => Some(Int),
            (Double, Double) => Some(Double),
            _ => None,
        },
        BinaryOp::Modulo => match (left, right) {
            (Int, Int) => Some(Int),
            _ => None,
        },
        BinaryOp::Less | BinaryOp::LessEquals | BinaryOp::Greater | BinaryOp::GreaterEquals => {
            match (left, right) {
                (Int, Int) | (Double, Double) => Some(Bool),
                _ => None,
            }
        }
        BinaryOp::Equals | BinaryOp::NotEquals => match (left, right) {
            (Int, Int) | (Bool, Bool) | (Double, Double) | (String, String) => Some(Bool),
            _ if left.is_reference()
                && right.is_reference()
                && (left.accepts(right) || right.accepts(left)) =>
            {
                Some(Bool)
            }
            _ => None,
        },
        BinaryOp::And | BinaryOp::Or => match (left, right) {
            (Bool, Bool) => Some(Bool),
            _ => None,
        },
    }
}

pub fn prefix_result_type(operator: PrefixOp, operand: &Type) -> Option<Type> {
    match (operator, operand) {
        (PrefixOp::Negate, Type::Int) => Some(Type::Int),
        (PrefixOp::Negate, Type::Double) => Some(Type::Double),
        (PrefixOp::Not, Type::Bool) => Some(Type::Bool),
        _ => None,
    }
}

/// `(operand type, result type)` of a conversion builtin.
pub fn conversion_types(conversion: Conversion) -> (Type, Type) {
    match conversion {
        Conversion::Itod => (Type::Int, Type::Double),
        Conversion::Dtoi => (Type::Double, Type::Int),
        Conversion::Itob => (Type::Int, Type::Bool),
        Conversion::Btoi => (Type::Bool, Type::Int),
    }
}

/// Generates an expression, leaving its value on the runtime stack.
///
/// On return the shadow stack is exactly one entry deeper, except for a call
/// to a `void` function, which pushes nothing.
pub fn gen_expression(generator: &mut CodeGenerator, expr: &Expr) -> Result<(), Error> {
    let depth = generator.shadow.len();
    let position = &expr.span.start;

    match &expr.kind {
        ExprKind::IntLiteral(value) => {
            generator.emit(format!("li $t0, {}", value));
            generator.push("$t0", Type::Int);
        }
        ExprKind::DoubleLiteral(value) => {
            generator.emit(format!("li $t0, {}", (*value as f32).to_bits() as i32));
            generator.push("$t0", Type::Double);
        }
        ExprKind::BoolLiteral(value) => {
            generator.emit(format!("li $t0, {}", *value as i32));
            generator.push("$t0", Type::Bool);
        }
        ExprKind::StringLiteral(value) => {
            let label = generator.string_label(value);
            generator.emit(format!("la $a0, {}", label));
            generator.emit(format!("jal {}", runtime::STRDUP));
            generator.push("$v0", Type::String);
        }
        ExprKind::Null => {
            generator.emit("li $t0, 0");
            generator.push("$t0", Type::Null);
        }
        ExprKind::This => {
            let scope = generator.scope_of(expr.id, position)?;
            let this = generator.analysis.tree.find_var(scope, "this", position)?;
            push_variable(generator, &this, scope, position)?;
        }
        ExprKind::Identifier(name) => {
            let scope = generator.scope_of(expr.id, position)?;
            let variable = generator.analysis.tree.find_var(scope, name, position)?;
            push_variable(generator, &variable, scope, position)?;
        }
        ExprKind::Binary(binary) => gen_binary(generator, binary, position)?,
        ExprKind::Prefix(prefix) => gen_prefix(generator, prefix, position)?,
        ExprKind::Assignment(assignment) => gen_assignment(generator, assignment)?,
        ExprKind::Call(call) => gen_call(generator, expr, call)?,
        ExprKind::Field(field) => gen_field(generator, field, position)?,
        ExprKind::Index(index) => gen_index(generator, index, position)?,
        ExprKind::NewObject(name) => {
            generator.ctx.require_classes(position)?;
            let scope = generator.scope_of(expr.id, position)?;
            let type_ = generator.analysis.tree.find_type(scope, name, position)?;
            let class = match type_ {
                Type::Class(class) => class,
                other => return Err(type_mismatch("a class", &other, position)),
            };
            let size = generator.analysis.tree.class(class.id).size;
            generator.emit(format!("li $a0, {}", size));
            generator.emit("li $v0, 9");
            generator.emit("syscall");
            // vtable placeholder
            generator.emit("sw $zero, 0($v0)");
            generator.push("$v0", Type::Class(class));
        }
        ExprKind::NewArray(array) => gen_new_array(generator, expr, array)?,
        ExprKind::Conversion(conversion) => gen_conversion(generator, conversion, position)?,
        ExprKind::ReadInteger => {
            generator.emit("li $v0, 5");
            generator.emit("syscall");
            generator.push("$v0", Type::Int);
        }
        ExprKind::ReadLine => {
            generator.emit(format!("jal {}", runtime::READLINE));
            generator.push("$v0", Type::String);
        }
    }

    let pushed = generator.shadow.len() as isize - depth as isize;
    let void_call = pushed == 0 && matches!(expr.kind, ExprKind::Call(_));
    if pushed != 1 && !void_call {
        return Err(internal_error(
            &format!("expression changed the shadow stack by {}", pushed),
            position,
        ));
    }

    Ok(())
}

/// Generates an expression that must produce a value and returns its type.
pub fn gen_value(generator: &mut CodeGenerator, expr: &Expr) -> Result<Type, Error> {
    let depth = generator.shadow.len();
    gen_expression(generator, expr)?;
    if generator.shadow.len() == depth {
        return Err(Error::new(ErrorImpl::VoidValue, expr.span.start.clone()));
    }
    generator
        .shadow
        .last()
        .cloned()
        .ok_or_else(|| internal_error("shadow stack underflow", &expr.span.start))
}

fn push_variable(
    generator: &mut CodeGenerator,
    variable: &Variable,
    scope: ScopeId,
    position: &Position,
) -> Result<(), Error> {
    generator.load_variable(variable, scope, "$t0", position)?;
    generator.push("$t0", variable.type_.clone());
    Ok(())
}

fn type_mismatch(expected: &str, received: &Type, position: &Position) -> Error {
    Error::new(
        ErrorImpl::TypeMatchError {
            expected: expected.to_string(),
            received: received.to_string(),
        },
        position.clone(),
    )
}

fn gen_binary(
    generator: &mut CodeGenerator,
    binary: &BinaryExpr,
    position: &Position,
) -> Result<(), Error> {
    let left = gen_value(generator, &binary.left)?;
    let right = gen_value(generator, &binary.right)?;
    let operator = binary.operator;

    let result = binary_result_type(operator, &left, &right).ok_or_else(|| {
        Error::new(
            ErrorImpl::InvalidOperands {
                operator: operator.to_string(),
                left: left.to_string(),
                right: right.to_string(),
            },
            position.clone(),
        )
    })?;

    match left {
        Type::Double => {
            generator.pop_float("$f2", position)?;
            generator.pop_float("$f0", position)?;
            if operator.is_arithmetic() {
                let instruction = match operator {
                    BinaryOp::Add => "add.s",
                    BinaryOp::Subtract => "sub.s",
                    BinaryOp::Multiply => "mul.s",
                    _ => "div.s",
                };
                generator.emit(format!("{} $f0, $f0, $f2", instruction));
                generator.push_float("$f0", result);
            } else {
                gen_float_compare(generator, operator);
                generator.push("$t0", result);
            }
        }
        Type::String => {
            generator.pop("$a1", position)?;
            generator.pop("$a0", position)?;
            match operator {
                BinaryOp::Add => generator.emit(format!("jal {}", runtime::STRCAT)),
                BinaryOp::Equals => generator.emit(format!("jal {}", runtime::STREQ)),
                _ => {
                    generator.emit(format!("jal {}", runtime::STREQ));
                    generator.emit("xori $v0, $v0, 1");
                }
            }
            generator.push("$v0", result);
        }
        _ => {
            generator.pop("$t1", position)?;
            generator.pop("$t0", position)?;
            let instruction = match operator {
                BinaryOp::Add => "addu",
                BinaryOp::Subtract => "subu",
                BinaryOp::Multiply => "mul",
                BinaryOp::Divide => "div",
                BinaryOp::Modulo => "rem",
                BinaryOp::Less => "slt",
                BinaryOp::LessEquals => "sle",
                BinaryOp::Greater => "sgt",
                BinaryOp::GreaterEquals => "sge",
                BinaryOp::Equals => "seq",
                BinaryOp::NotEquals => "sne",
                BinaryOp::And => "and",
                BinaryOp::Or => "or",
            };
            generator.emit(format!("{} $t0, $t0, $t1", instruction));
            generator.push("$t0", result);
        }
    }

    Ok(())
}

/// Compares `$f0` with `$f2` and leaves 1 or 0 in `$t0`.
fn gen_float_compare(generator: &mut CodeGenerator, operator: BinaryOp) {
    let (compare, branch) = match operator {
        BinaryOp::Less => ("c.lt.s $f0, $f2", "bc1t"),
        BinaryOp::LessEquals => ("c.le.s $f0, $f2", "bc1t"),
        BinaryOp::Greater => ("c.lt.s $f2, $f0", "bc1t"),
        BinaryOp::GreaterEquals => ("c.le.s $f2, $f0", "bc1t"),
        BinaryOp::NotEquals => ("c.eq.s $f0, $f2", "bc1f"),
        _ => ("c.eq.s $f0, $f2", "bc1t"),
    };
    let label = format!("cmp_{}", generator.ctx.next_label());

    generator.emit("li $t0, 1");
    generator.emit(compare);
    generator.emit(format!("{} {}", branch, label));
    generator.emit("li $t0, 0");
    generator.emit_label(label);
}

fn gen_prefix(
    generator: &mut CodeGenerator,
    prefix: &PrefixExpr,
    position: &Position,
) -> Result<(), Error> {
    let operand = gen_value(generator, &prefix.operand)?;
    let result = prefix_result_type(prefix.operator, &operand).ok_or_else(|| {
        Error::new(
            ErrorImpl::InvalidOperand {
                operator: prefix.operator.to_string(),
                operand: operand.to_string(),
            },
            position.clone(),
        )
    })?;

    match (prefix.operator, result) {
        (PrefixOp::Negate, Type::Double) => {
            generator.pop_float("$f0", position)?;
            generator.emit("neg.s $f0, $f0");
            generator.push_float("$f0", Type::Double);
        }
        (PrefixOp::Negate, result) => {
            generator.pop("$t0", position)?;
            generator.emit("subu $t0, $zero, $t0");
            generator.push("$t0", result);
        }
        (PrefixOp::Not, result) => {
            generator.pop("$t0", position)?;
            generator.emit("xori $t0, $t0, 1");
            generator.push("$t0", result);
        }
    }

    Ok(())
}

/// Stores the right-hand side into the lvalue. The expression itself is `true`.
fn gen_assignment(
    generator: &mut CodeGenerator,
    assignment: &AssignmentExpr,
) -> Result<(), Error> {
    let assignee = &assignment.assignee;
    let position = &assignee.span.start;

    let check = |expected: &Type, received: &Type| {
        if expected.accepts(received) {
            Ok(())
        } else {
            Err(type_mismatch(
                &expected.to_string(),
                received,
                &assignment.value.span.start,
            ))
        }
    };

    match &assignee.kind {
        ExprKind::Identifier(name) => {
            let scope = generator.scope_of(assignee.id, position)?;
            let variable = generator.analysis.tree.find_var(scope, name, position)?;
            let value = gen_value(generator, &assignment.value)?;
            check(&variable.type_, &value)?;
            generator.pop("$t0", position)?;
            generator.store_variable(&variable, scope, "$t0", position)?;
        }
        ExprKind::Field(field) => {
            let member = gen_member_object(generator, field, position)?;
            let value = gen_value(generator, &assignment.value)?;
            check(&member.type_, &value)?;
            generator.pop("$t1", position)?;
            generator.pop("$t0", position)?;
            generator.emit(format!("sw $t1, {}($t0)", field_offset(&member, position)?));
        }
        ExprKind::Index(index) => {
            let element = gen_element_address(generator, index, position)?;
            let value = gen_value(generator, &assignment.value)?;
            check(&element, &value)?;
            generator.pop("$t1", position)?;
            generator.pop("$t0", position)?;
            generator.emit("sw $t1, 4($t0)");
        }
        _ => {
            return Err(Error::new(ErrorImpl::NotAssignable, position.clone()));
        }
    }

    generator.emit("li $t0, 1");
    generator.push("$t0", Type::Bool);
    Ok(())
}

/// Evaluates the object of a field access and returns the member it names.
/// The object pointer is left on the stack.
fn gen_member_object(
    generator: &mut CodeGenerator,
    field: &FieldExpr,
    position: &Position,
) -> Result<Rc<Variable>, Error> {
    generator.ctx.require_classes(position)?;
    let object = gen_value(generator, &field.object)?;
    let unknown = || {
        Error::new(
            ErrorImpl::UnknownMember {
                type_: object.to_string(),
                member: field.name.clone(),
            },
            position.clone(),
        )
    };

    let Type::Class(class) = &object else {
        return Err(unknown());
    };
    generator
        .analysis
        .tree
        .class(class.id)
        .members
        .get(&field.name)
        .cloned()
        .ok_or_else(unknown)
}

fn field_offset(member: &Variable, position: &Position) -> Result<u32, Error> {
    match member.storage {
        Storage::Field(offset) => Ok(offset),
        _ => Err(internal_error("class member without field storage", position)),
    }
}

fn gen_field(
    generator: &mut CodeGenerator,
    field: &FieldExpr,
    position: &Position,
) -> Result<(), Error> {
    let member = gen_member_object(generator, field, position)?;
    generator.pop("$t0", position)?;
    generator.emit(format!("lw $t0, {}($t0)", field_offset(&member, position)?));
    generator.push("$t0", member.type_.clone());
    Ok(())
}

/// Evaluates `array[index]` down to the address of the element minus the
/// length word, left on the stack, and returns the element type.
fn gen_element_address(
    generator: &mut CodeGenerator,
    index: &IndexExpr,
    position: &Position,
) -> Result<Type, Error> {
    generator.ctx.require_arrays(position)?;
    let array = gen_value(generator, &index.array)?;
    let element = array.element().cloned().ok_or_else(|| {
        Error::new(
            ErrorImpl::InvalidOperand {
                operator: String::from("[]"),
                operand: array.to_string(),
            },
            position.clone(),
        )
    })?;

    let subscript = gen_value(generator, &index.index)?;
    if subscript != Type::Int {
        return Err(type_mismatch("int", &subscript, &index.index.span.start));
    }

    generator.pop("$t1", position)?;
    generator.pop("$t0", position)?;
    generator.emit("mul $t1, $t1, 4");
    generator.emit("addu $t0, $t0, $t1");
    generator.push("$t0", Type::Int);
    Ok(element)
}

fn gen_index(
    generator: &mut CodeGenerator,
    index: &IndexExpr,
    position: &Position,
) -> Result<(), Error> {
    let element = gen_element_address(generator, index, position)?;
    generator.pop("$t0", position)?;
    generator.emit("lw $t0, 4($t0)");
    generator.push("$t0", element);
    Ok(())
}

fn gen_call(generator: &mut CodeGenerator, expr: &Expr, call: &CallExpr) -> Result<(), Error> {
    let position = &call.name_position;
    let scope = generator.scope_of(expr.id, position)?;

    let function = match &call.receiver {
        Some(receiver) => {
            let object = gen_value(generator, receiver)?;
            match &object {
                Type::Array(_) if call.name == "length" => {
                    if !call.arguments.is_empty() {
                        return Err(Error::new(
                            ErrorImpl::UnexpectedArguments {
                                expected: 0,
                                received: call.arguments.len(),
                            },
                            position.clone(),
                        ));
                    }
                    generator.pop("$t0", position)?;
                    generator.emit("lw $t0, 0($t0)");
                    generator.push("$t0", Type::Int);
                    return Ok(());
                }
                Type::Class(class) => generator
                    .analysis
                    .tree
                    .class(class.id)
                    .methods
                    .get(&call.name)
                    .cloned()
                    .ok_or_else(|| {
                        Error::new(
                            ErrorImpl::UnknownMember {
                                type_: object.to_string(),
                                member: call.name.clone(),
                            },
                            position.clone(),
                        )
                    })?,
                _ => {
                    return Err(Error::new(
                        ErrorImpl::UnknownMember {
                            type_: object.to_string(),
                            member: call.name.clone(),
                        },
                        position.clone(),
                    ))
                }
            }
        }
        None => {
            let function = generator
                .analysis
                .tree
                .find_func(scope, &call.name, position)?;
            if function.is_method() {
                // Calling a sibling method passes our own `this` along
                let this = generator.analysis.tree.find_var(scope, "this", position)?;
                push_variable(generator, &this, scope, position)?;
            }
            function
        }
    };

    let implicit = usize::from(function.is_method());
    let formals = &function.formals[implicit..];
    if call.arguments.len() > formals.len() {
        return Err(Error::new(
            ErrorImpl::UnexpectedArguments {
                expected: formals.len(),
                received: call.arguments.len(),
            },
            position.clone(),
        ));
    }
    if call.arguments.len() < formals.len() {
        return Err(Error::new(
            ErrorImpl::MissingArguments {
                expected: formals.len(),
                received: call.arguments.len(),
            },
            position.clone(),
        ));
    }

    for (formal, argument) in formals.iter().zip(&call.arguments) {
        let actual = gen_value(generator, argument)?;
        if !formal.type_.accepts(&actual) {
            return Err(Error::new(
                ErrorImpl::ArgumentTypeMatchError {
                    expected: formal.type_.to_string(),
                    received: actual.to_string(),
                },
                argument.span.start.clone(),
            ));
        }
    }

    generator.emit(format!("jal {}", function.label));
    generator.discard(function.formals.len(), position)?;
    if function.return_type != Type::Void {
        generator.push("$v0", function.return_type.clone());
    }

    Ok(())
}

fn gen_new_array(
    generator: &mut CodeGenerator,
    expr: &Expr,
    array: &NewArrayExpr,
) -> Result<(), Error> {
    let position = &expr.span.start;
    generator.ctx.require_arrays(position)?;
    let scope = generator.scope_of(expr.id, position)?;
    let element = generator.resolve_type(scope, &array.element_type)?;

    let invalid = |reason: &str| {
        Error::new(
            ErrorImpl::InvalidArraySize {
                reason: reason.to_string(),
            },
            array.size.span.start.clone(),
        )
    };
    match array.size.kind.constant_int() {
        Some(size) if size <= 0 => return Err(invalid("size must be positive")),
        None if !generator.ctx.options.capabilities.dynamic_array_sizes => {
            return Err(invalid("size must be an integer constant"))
        }
        _ => {}
    }

    let size = gen_value(generator, &array.size)?;
    if size != Type::Int {
        return Err(type_mismatch("int", &size, &array.size.span.start));
    }

    generator.pop("$a0", position)?;
    generator.emit(format!("jal {}", runtime::NEWARRAY));
    generator.push("$v0", Type::Array(Box::new(element)));
    Ok(())
}

fn gen_conversion(
    generator: &mut CodeGenerator,
    conversion: &ConversionExpr,
    position: &Position,
) -> Result<(), Error> {
    let (expected, result) = conversion_types(conversion.conversion);
    let operand = gen_value(generator, &conversion.operand)?;
    if operand != expected {
        return Err(type_mismatch(
            &expected.to_string(),
            &operand,
            &conversion.operand.span.start,
        ));
    }

    match conversion.conversion {
        Conversion::Itod => {
            generator.pop("$t0", position)?;
            generator.emit("mtc1 $t0, $f0");
            generator.emit("cvt.s.w $f0, $f0");
            generator.push_float("$f0", result);
        }
        Conversion::Dtoi => {
            // Round half away from zero: add +-0.5, then truncate
            let label = format!("dtoi_pos_{}", generator.ctx.next_label());
            generator.pop_float("$f0", position)?;
            generator.emit(format!("li $t0, {}", HALF));
            generator.emit("mtc1 $t0, $f2");
            generator.emit("mtc1 $zero, $f4");
            generator.emit("c.lt.s $f0, $f4");
            generator.emit(format!("bc1f {}", label));
            generator.emit("neg.s $f2, $f2");
            generator.emit_label(label);
            generator.emit("add.s $f0, $f0, $f2");
            generator.emit("trunc.w.s $f0, $f0");
            generator.emit("mfc1 $t0, $f0");
            generator.push("$t0", result);
        }
        Conversion::Itob => {
            generator.pop("$t0", position)?;
            generator.emit("sne $t0, $t0, $zero");
            generator.push("$t0", result);
        }
        Conversion::Btoi => {
            generator.pop("$t0", position)?;
            generator.push("$t0", result);
        }
    }

    Ok(())
}
