//! Type parsing implementation.
//!
//! This module handles parsing of type annotations in declarations and
//! `NewArray`. It supports:
//!
//! - Primitive types (`int`, `double`, `bool`, `string`)
//! - Class types (identifiers)
//! - Array types (`T[]`, nestable)
//!
//! Similar to expression parsing, it uses NUD/LED handlers with
//! binding powers for parsing complex type expressions.

use std::collections::HashMap;

use crate::{
    ast::types::TypeSyntax,
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::TokenKind,
};

use super::{lookups::BindingPower, parser::Parser};

/// Type alias for type null denotation handler functions.
pub type TypeNUDHandler = fn(&mut Parser) -> Result<TypeSyntax, Error>;

/// Type alias for type left denotation handler functions.
pub type TypeLEDHandler = fn(&mut Parser, TypeSyntax, BindingPower) -> Result<TypeSyntax, Error>;

/// Type alias for type NUD lookup table.
pub type TypeNUDLookup = HashMap<TokenKind, TypeNUDHandler>;

/// Type alias for type LED lookup table.
pub type TypeLEDLookup = HashMap<TokenKind, TypeLEDHandler>;

/// Type alias for type binding power lookup table.
pub type TypeBPLookup = HashMap<TokenKind, BindingPower>;

/// Initializes the type parsing lookup tables.
pub fn create_token_type_lookups(parser: &mut Parser) {
    parser.type_nud(TokenKind::Int, parse_named_type);
    parser.type_nud(TokenKind::Double, parse_named_type);
    parser.type_nud(TokenKind::Bool, parse_named_type);
    parser.type_nud(TokenKind::StringType, parse_named_type);
    parser.type_nud(TokenKind::Identifier, parse_named_type);
    parser.type_led(TokenKind::OpenBracket, BindingPower::Call, parse_array_type);
}

pub fn parse_named_type(parser: &mut Parser) -> Result<TypeSyntax, Error> {
    let token = parser.advance().clone();
    Ok(TypeSyntax::Named {
        name: token.value,
        position: token.span.start,
    })
}

pub fn parse_array_type(
    parser: &mut Parser,
    left: TypeSyntax,
    _bp: BindingPower,
) -> Result<TypeSyntax, Error> {
    parser.expect(TokenKind::OpenBracket)?;
    parser.expect(TokenKind::CloseBracket)?;

    Ok(TypeSyntax::Array(Box::new(left)))
}

pub fn parse_type(parser: &mut Parser, bp: BindingPower) -> Result<TypeSyntax, Error> {
    // First parse NUD
    let token_kind = parser.current_token_kind();
    let nud = match parser.get_type_nud_lookup().get(&token_kind) {
        Some(nud) => *nud,
        None => {
            return Err(Error::new(
                ErrorImpl::UnexpectedTokenDetailed {
                    token: parser.current_token().value.clone(),
                    message: String::from("expected a type"),
                },
                parser.get_position(),
            ))
        }
    };

    let mut left = nud(parser)?;

    // While LED and current BP is less than BP of current token, continue parsing lhs
    loop {
        let token_kind = parser.current_token_kind();
        let token_bp = *parser
            .get_type_bp_lookup()
            .get(&token_kind)
            .unwrap_or(&BindingPower::Default);
        if token_bp <= bp {
            break;
        }

        let led = match parser.get_type_led_lookup().get(&token_kind) {
            Some(led) => *led,
            None => return Err(parser.unexpected()),
        };
        left = led(parser, left, token_bp)?;
    }

    Ok(left)
}
