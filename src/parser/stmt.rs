use crate::{
    ast::{
        ast::{Expr, Stmt, VarDecl},
        statements::{BlockStmt, ForStmt, IfStmt, StmtKind, WhileStmt},
    },
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::TokenKind,
    parser::{expr::parse_expr, lookups::BindingPower},
    Position,
};

use super::{parser::Parser, types::parse_type};

fn make_stmt(parser: &mut Parser, start: Position, kind: StmtKind) -> Stmt {
    Stmt {
        id: parser.advance_id(),
        span: parser.span_from(start),
        kind,
    }
}

/// A declaration starts with a primitive type keyword, `Class name`, or `Class[]`.
pub fn is_var_decl_start(parser: &Parser) -> bool {
    let current = parser.current_token_kind();
    if current.is_primitive_type() {
        return true;
    }

    current == TokenKind::Identifier
        && (parser.peek(1).kind == TokenKind::Identifier
            || (parser.peek(1).kind == TokenKind::OpenBracket
                && parser.peek(2).kind == TokenKind::CloseBracket))
}

pub fn parse_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let kind = parser.current_token_kind();
    if let Some(handler) = parser.get_stmt_lookup().get(&kind).copied() {
        return handler(parser);
    }

    if is_var_decl_start(parser) {
        let start = parser.get_position();
        let decl = parse_var_decl(parser)?;
        return Ok(make_stmt(parser, start, StmtKind::VarDecl(decl)));
    }

    let start = parser.get_position();
    let expr = parse_expr(parser, BindingPower::Default)?;

    parser.expect(TokenKind::Semicolon)?;

    Ok(make_stmt(parser, start, StmtKind::Expression(expr)))
}

/// `Type name` without the trailing semicolon, as used by formals.
pub fn parse_variable(parser: &mut Parser) -> Result<VarDecl, Error> {
    let start = parser.get_position();
    let type_ = parse_type(parser, BindingPower::Default)?;

    let error = Error::new(
        ErrorImpl::UnexpectedTokenDetailed {
            token: parser.current_token().value.clone(),
            message: String::from("expected identifier during variable declaration"),
        },
        parser.get_position(),
    );
    let name = parser.expect_error(TokenKind::Identifier, Some(error))?.value;

    Ok(VarDecl {
        id: parser.advance_id(),
        name,
        type_,
        span: parser.span_from(start),
    })
}

pub fn parse_var_decl(parser: &mut Parser) -> Result<VarDecl, Error> {
    let decl = parse_variable(parser)?;
    parser.expect(TokenKind::Semicolon)?;
    Ok(decl)
}

pub fn parse_block(parser: &mut Parser) -> Result<BlockStmt, Error> {
    let start = parser.expect(TokenKind::OpenCurly)?.span.start;

    let mut statements = Vec::new();
    while parser.current_token_kind() != TokenKind::CloseCurly {
        if !parser.has_tokens() {
            return Err(Error::new(
                ErrorImpl::UnexpectedTokenDetailed {
                    token: parser.current_token().value.clone(),
                    message: String::from("unterminated block, expected `}`"),
                },
                parser.get_position(),
            ));
        }
        statements.push(parse_stmt(parser)?);
    }

    parser.expect(TokenKind::CloseCurly)?;

    Ok(BlockStmt {
        id: parser.advance_id(),
        body: statements,
        span: parser.span_from(start),
    })
}

pub fn parse_block_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.get_position();
    let block = parse_block(parser)?;
    Ok(make_stmt(parser, start, StmtKind::Block(block)))
}

pub fn parse_empty_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();
    Ok(make_stmt(parser, start, StmtKind::Empty))
}

fn parse_condition(parser: &mut Parser) -> Result<Expr, Error> {
    parser.expect(TokenKind::OpenParen)?;
    let condition = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseParen)?;
    Ok(condition)
}

pub fn parse_if_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();

    let condition = parse_condition(parser)?;
    let then_body = parse_stmt(parser)?;

    let else_body = if parser.current_token_kind() == TokenKind::Else {
        parser.advance();
        Some(Box::new(parse_stmt(parser)?))
    } else {
        None
    };

    Ok(make_stmt(
        parser,
        start,
        StmtKind::If(IfStmt {
            condition,
            then_body: Box::new(then_body),
            else_body,
        }),
    ))
}

pub fn parse_while_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();

    let condition = parse_condition(parser)?;
    let body = parse_stmt(parser)?;

    Ok(make_stmt(
        parser,
        start,
        StmtKind::While(WhileStmt {
            condition,
            body: Box::new(body),
        }),
    ))
}

fn parse_optional_clause(
    parser: &mut Parser,
    terminator: TokenKind,
) -> Result<Option<Expr>, Error> {
    let clause = if parser.current_token_kind() == terminator {
        None
    } else {
        Some(parse_expr(parser, BindingPower::Default)?)
    };
    parser.expect(terminator)?;
    Ok(clause)
}

pub fn parse_for_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    // for (init; condition; update) body
    let start = parser.advance().span.start.clone();
    parser.expect(TokenKind::OpenParen)?;

    let init = parse_optional_clause(parser, TokenKind::Semicolon)?;
    let condition = parse_optional_clause(parser, TokenKind::Semicolon)?;
    let update = parse_optional_clause(parser, TokenKind::CloseParen)?;
    let body = parse_stmt(parser)?;

    Ok(make_stmt(
        parser,
        start,
        StmtKind::For(ForStmt {
            init,
            condition,
            update,
            body: Box::new(body),
        }),
    ))
}

pub fn parse_break_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();
    parser.expect(TokenKind::Semicolon)?;
    Ok(make_stmt(parser, start, StmtKind::Break))
}

pub fn parse_continue_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();
    parser.expect(TokenKind::Semicolon)?;
    Ok(make_stmt(parser, start, StmtKind::Continue))
}

pub fn parse_return_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();

    let value = if parser.current_token_kind() != TokenKind::Semicolon {
        Some(parse_expr(parser, BindingPower::Default)?)
    } else {
        None
    };

    parser.expect(TokenKind::Semicolon)?;

    Ok(make_stmt(parser, start, StmtKind::Return(value)))
}

pub fn parse_print_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    // Print(a, b, ...);
    let start = parser.advance().span.start.clone();
    parser.expect(TokenKind::OpenParen)?;

    let mut arguments = vec![parse_expr(parser, BindingPower::Comma)?];
    while parser.current_token_kind() == TokenKind::Comma {
        parser.advance();
        arguments.push(parse_expr(parser, BindingPower::Comma)?);
    }

    parser.expect(TokenKind::CloseParen)?;
    parser.expect(TokenKind::Semicolon)?;

    Ok(make_stmt(parser, start, StmtKind::Print(arguments)))
}
