//! Top-level and class-member declarations.

use crate::{
    ast::{ast::{ClassDecl, ClassMember, Decl, FnDecl, VarDecl}, types::TypeSyntax},
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::TokenKind,
    Position,
};

use super::{
    lookups::BindingPower,
    parser::Parser,
    stmt::{parse_block, parse_variable},
    types::parse_type,
};

/// Either a variable or a function, distinguished by the token after the name.
enum Member {
    Variable(VarDecl),
    Function(FnDecl),
}

pub fn parse_decl(parser: &mut Parser) -> Result<Decl, Error> {
    if parser.current_token_kind() == TokenKind::Class {
        return Ok(Decl::Class(parse_class_decl(parser)?));
    }

    match parse_member(parser)? {
        Member::Variable(decl) => Ok(Decl::Variable(decl)),
        Member::Function(decl) => Ok(Decl::Function(decl)),
    }
}

fn parse_member(parser: &mut Parser) -> Result<Member, Error> {
    let start = parser.get_position();

    if parser.current_token_kind() == TokenKind::Void {
        parser.advance();
        let name = parser.expect(TokenKind::Identifier)?.value;
        return Ok(Member::Function(parse_fn_rest(parser, start, name, None)?));
    }

    let type_ = parse_type(parser, BindingPower::Default)?;
    let name = parser.expect(TokenKind::Identifier)?.value;

    match parser.current_token_kind() {
        TokenKind::OpenParen => Ok(Member::Function(parse_fn_rest(
            parser,
            start,
            name,
            Some(type_),
        )?)),
        TokenKind::Semicolon => {
            parser.advance();
            Ok(Member::Variable(VarDecl {
                id: parser.advance_id(),
                name,
                type_,
                span: parser.span_from(start),
            }))
        }
        _ => Err(Error::new(
            ErrorImpl::UnexpectedTokenDetailed {
                token: parser.current_token().value.clone(),
                message: String::from("expected `;` or `(` after declaration name"),
            },
            parser.get_position(),
        )),
    }
}

fn parse_fn_rest(
    parser: &mut Parser,
    start: Position,
    name: String,
    return_type: Option<TypeSyntax>,
) -> Result<FnDecl, Error> {
    parser.expect(TokenKind::OpenParen)?;

    let mut formals = Vec::new();
    if parser.current_token_kind() != TokenKind::CloseParen {
        loop {
            formals.push(parse_variable(parser)?);
            if parser.current_token_kind() != TokenKind::Comma {
                break;
            }
            parser.advance();
        }
    }

    parser.expect(TokenKind::CloseParen)?;

    let body = parse_block(parser)?;

    Ok(FnDecl {
        id: parser.advance_id(),
        name,
        return_type,
        formals,
        body,
        span: parser.span_from(start),
    })
}

pub fn parse_class_decl(parser: &mut Parser) -> Result<ClassDecl, Error> {
    let start = parser.advance().span.start.clone();

    let name = parser.expect(TokenKind::Identifier)?.value;

    parser.expect(TokenKind::OpenCurly)?;

    let mut members = Vec::new();
    while parser.current_token_kind() != TokenKind::CloseCurly {
        if !parser.has_tokens() {
            return Err(parser.unexpected());
        }
        match parse_member(parser)? {
            Member::Variable(decl) => members.push(ClassMember::Variable(decl)),
            Member::Function(decl) => members.push(ClassMember::Method(decl)),
        }
    }

    parser.expect(TokenKind::CloseCurly)?;

    Ok(ClassDecl {
        id: parser.advance_id(),
        name,
        members,
        span: parser.span_from(start),
    })
}
