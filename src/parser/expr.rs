use crate::{
    ast::{
        ast::Expr,
        expressions::{
            AssignmentExpr, BinaryExpr, BinaryOp, CallExpr, Conversion, ConversionExpr, ExprKind,
            FieldExpr, IndexExpr, NewArrayExpr, PrefixExpr, PrefixOp,
        },
    },
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::TokenKind,
    Span,
};

use super::{lookups::BindingPower, parser::Parser, types::parse_type};

fn make_expr(parser: &mut Parser, span: Span, kind: ExprKind) -> Expr {
    Expr {
        id: parser.advance_id(),
        span,
        kind,
    }
}

pub fn parse_expr(parser: &mut Parser, bp: BindingPower) -> Result<Expr, Error> {
    // First parse NUD
    let token_kind = parser.current_token_kind();
    let nud = match parser.get_nud_lookup().get(&token_kind) {
        Some(nud) => *nud,
        None => return Err(parser.unexpected()),
    };

    let mut left = nud(parser)?;

    // While LED and current BP is less than BP of current token, continue parsing lhs
    loop {
        let token_kind = parser.current_token_kind();
        let token_bp = *parser
            .get_bp_lookup()
            .get(&token_kind)
            .unwrap_or(&BindingPower::Default);
        if token_bp <= bp {
            break;
        }

        let led = match parser.get_led_lookup().get(&token_kind) {
            Some(led) => *led,
            None => return Err(parser.unexpected()),
        };
        left = led(parser, left, token_bp)?;
    }

    Ok(left)
}

pub fn parse_primary_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let token = parser.advance().clone();

    let kind = match token.kind {
        TokenKind::IntLiteral => ExprKind::IntLiteral(parse_int_literal(&token.value).ok_or_else(
            || {
                Error::new(
                    ErrorImpl::NumberParseError {
                        token: token.value.clone(),
                    },
                    token.span.start.clone(),
                )
            },
        )?),
        TokenKind::DoubleLiteral => {
            let value = token.value.parse::<f64>().map_err(|_| {
                Error::new(
                    ErrorImpl::NumberParseError {
                        token: token.value.clone(),
                    },
                    token.span.start.clone(),
                )
            })?;
            ExprKind::DoubleLiteral(value)
        }
        TokenKind::String => ExprKind::StringLiteral(token.value.clone()),
        TokenKind::True => ExprKind::BoolLiteral(true),
        TokenKind::False => ExprKind::BoolLiteral(false),
        TokenKind::Null => ExprKind::Null,
        TokenKind::This => ExprKind::This,
        TokenKind::Identifier => ExprKind::Identifier(token.value.clone()),
        _ => {
            return Err(Error::new(
                ErrorImpl::UnexpectedToken { token: token.value },
                token.span.start,
            ))
        }
    };

    Ok(make_expr(parser, token.span, kind))
}

/// Decimal or `0x` hexadecimal. Hex literals may use the full 32 bits.
fn parse_int_literal(text: &str) -> Option<i32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok().map(|value| value as i32)
    } else {
        text.parse::<i32>().ok()
    }
}

pub fn parse_binary_expr(parser: &mut Parser, left: Expr, bp: BindingPower) -> Result<Expr, Error> {
    let operator_token = parser.advance().clone();

    let operator = match operator_token.kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Dash => BinaryOp::Subtract,
        TokenKind::Star => BinaryOp::Multiply,
        TokenKind::Slash => BinaryOp::Divide,
        TokenKind::Percent => BinaryOp::Modulo,
        TokenKind::Less => BinaryOp::Less,
        TokenKind::LessEquals => BinaryOp::LessEquals,
        TokenKind::Greater => BinaryOp::Greater,
        TokenKind::GreaterEquals => BinaryOp::GreaterEquals,
        TokenKind::Equals => BinaryOp::Equals,
        TokenKind::NotEquals => BinaryOp::NotEquals,
        TokenKind::And => BinaryOp::And,
        TokenKind::Or => BinaryOp::Or,
        _ => {
            return Err(Error::new(
                ErrorImpl::UnexpectedToken {
                    token: operator_token.value,
                },
                operator_token.span.start,
            ))
        }
    };

    let right = parse_expr(parser, bp)?;

    let span = Span {
        start: left.span.start.clone(),
        end: right.span.end.clone(),
    };
    Ok(make_expr(
        parser,
        span,
        ExprKind::Binary(BinaryExpr {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }),
    ))
}

pub fn parse_prefix_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let operator_token = parser.advance().clone();
    let operator = if operator_token.kind == TokenKind::Not {
        PrefixOp::Not
    } else {
        PrefixOp::Negate
    };
    let rhs = parse_expr(parser, BindingPower::Unary)?;

    let span = Span {
        start: operator_token.span.start.clone(),
        end: rhs.span.end.clone(),
    };
    Ok(make_expr(
        parser,
        span,
        ExprKind::Prefix(PrefixExpr {
            operator,
            operand: Box::new(rhs),
        }),
    ))
}

pub fn parse_assignment_expr(
    parser: &mut Parser,
    left: Expr,
    _bp: BindingPower,
) -> Result<Expr, Error> {
    parser.advance();
    // Right associative: `a = b = c` is `a = (b = c)`
    let rhs = parse_expr(parser, BindingPower::Comma)?;

    let span = Span {
        start: left.span.start.clone(),
        end: rhs.span.end.clone(),
    };
    Ok(make_expr(
        parser,
        span,
        ExprKind::Assignment(AssignmentExpr {
            assignee: Box::new(left),
            value: Box::new(rhs),
        }),
    ))
}

pub fn parse_grouping_expr(parser: &mut Parser) -> Result<Expr, Error> {
    parser.advance();
    let expr = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseParen)?;

    Ok(expr)
}

fn parse_arguments(parser: &mut Parser) -> Result<Vec<Expr>, Error> {
    parser.expect(TokenKind::OpenParen)?;

    let mut args = vec![];
    if parser.current_token_kind() != TokenKind::CloseParen {
        loop {
            args.push(parse_expr(parser, BindingPower::Comma)?);
            if parser.current_token_kind() != TokenKind::Comma {
                break;
            }
            parser.advance();
        }
    }

    parser.expect(TokenKind::CloseParen)?;
    Ok(args)
}

pub fn parse_call_expr(parser: &mut Parser, left: Expr, _bp: BindingPower) -> Result<Expr, Error> {
    let start = left.span.start.clone();

    let (receiver, name, name_position) = match left.kind {
        ExprKind::Identifier(name) => (None, name, left.span.start),
        ExprKind::Field(FieldExpr { object, name }) => (Some(object), name, left.span.end),
        _ => {
            return Err(Error::new(
                ErrorImpl::UnexpectedTokenDetailed {
                    token: String::from("("),
                    message: String::from("only named functions and methods can be called"),
                },
                parser.get_position(),
            ))
        }
    };

    let arguments = parse_arguments(parser)?;

    let span = parser.span_from(start);
    Ok(make_expr(
        parser,
        span,
        ExprKind::Call(CallExpr {
            receiver,
            name,
            name_position,
            arguments,
        }),
    ))
}

pub fn parse_member_expr(parser: &mut Parser, left: Expr, _bp: BindingPower) -> Result<Expr, Error> {
    parser.advance();
    let error = Error::new(
        ErrorImpl::UnexpectedTokenDetailed {
            token: parser.current_token().value.clone(),
            message: String::from("expected member name after `.`"),
        },
        parser.get_position(),
    );
    let member = parser.expect_error(TokenKind::Identifier, Some(error))?;

    let span = Span {
        start: left.span.start.clone(),
        end: member.span.end.clone(),
    };
    Ok(make_expr(
        parser,
        span,
        ExprKind::Field(FieldExpr {
            object: Box::new(left),
            name: member.value,
        }),
    ))
}

pub fn parse_index_expr(parser: &mut Parser, left: Expr, _bp: BindingPower) -> Result<Expr, Error> {
    parser.advance();
    let index = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseBracket)?;

    let span = parser.span_from(left.span.start.clone());
    Ok(make_expr(
        parser,
        span,
        ExprKind::Index(IndexExpr {
            array: Box::new(left),
            index: Box::new(index),
        }),
    ))
}

pub fn parse_new_object_expr(parser: &mut Parser) -> Result<Expr, Error> {
    // new Point
    let start = parser.advance().span.start.clone();
    let class_name = parser.expect(TokenKind::Identifier)?.value;

    let span = parser.span_from(start);
    Ok(make_expr(parser, span, ExprKind::NewObject(class_name)))
}

pub fn parse_new_array_expr(parser: &mut Parser) -> Result<Expr, Error> {
    // NewArray(size, type)
    let start = parser.advance().span.start.clone();
    parser.expect(TokenKind::OpenParen)?;
    let size = parse_expr(parser, BindingPower::Comma)?;
    parser.expect(TokenKind::Comma)?;
    let element_type = parse_type(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseParen)?;

    let span = parser.span_from(start);
    Ok(make_expr(
        parser,
        span,
        ExprKind::NewArray(NewArrayExpr {
            size: Box::new(size),
            element_type,
        }),
    ))
}

pub fn parse_read_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let token = parser.advance().clone();
    parser.expect(TokenKind::OpenParen)?;
    parser.expect(TokenKind::CloseParen)?;

    let kind = if token.kind == TokenKind::ReadInteger {
        ExprKind::ReadInteger
    } else {
        ExprKind::ReadLine
    };
    let span = parser.span_from(token.span.start);
    Ok(make_expr(parser, span, kind))
}

pub fn parse_conversion_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let token = parser.advance().clone();
    let conversion = match token.kind {
        TokenKind::Itod => Conversion::Itod,
        TokenKind::Dtoi => Conversion::Dtoi,
        TokenKind::Itob => Conversion::Itob,
        _ => Conversion::Btoi,
    };

    parser.expect(TokenKind::OpenParen)?;
    let operand = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseParen)?;

    let span = parser.span_from(token.span.start);
    Ok(make_expr(
        parser,
        span,
        ExprKind::Conversion(ConversionExpr {
            conversion,
            operand: Box::new(operand),
        }),
    ))
}
