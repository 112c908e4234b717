use lazy_static::lazy_static;
use std::{collections::HashMap, fmt::Display};

use crate::Span;

lazy_static! {
    pub static ref RESERVED_LOOKUP: HashMap<&'static str, TokenKind> = {
        let mut map = HashMap::new();
        map.insert("void", TokenKind::Void);
        map.insert("int", TokenKind::Int);
        map.insert("double", TokenKind::Double);
        map.insert("bool", TokenKind::Bool);
        map.insert("string", TokenKind::StringType);
        map.insert("class", TokenKind::Class);
        map.insert("null", TokenKind::Null);
        map.insert("this", TokenKind::This);
        map.insert("true", TokenKind::True);
        map.insert("false", TokenKind::False);
        map.insert("for", TokenKind::For);
        map.insert("while", TokenKind::While);
        map.insert("if", TokenKind::If);
        map.insert("else", TokenKind::Else);
        map.insert("return", TokenKind::Return);
        map.insert("break", TokenKind::Break);
        map.insert("continue", TokenKind::Continue);
        map.insert("new", TokenKind::New);
        map.insert("NewArray", TokenKind::NewArray);
        map.insert("Print", TokenKind::Print);
        map.insert("ReadInteger", TokenKind::ReadInteger);
        map.insert("ReadLine", TokenKind::ReadLine);
        map.insert("itod", TokenKind::Itod);
        map.insert("dtoi", TokenKind::Dtoi);
        map.insert("itob", TokenKind::Itob);
        map.insert("btoi", TokenKind::Btoi);
        map
    };
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TokenKind {
    EOF,
    IntLiteral,
    DoubleLiteral,
    String,
    Identifier,

    OpenBracket,
    CloseBracket,
    OpenCurly,
    CloseCurly,
    OpenParen,
    CloseParen,

    Assignment, // =
    Equals,     // ==
    Not,        // !
    NotEquals,  // !=

    Less,
    LessEquals,
    Greater,
    GreaterEquals,

    Or,
    And,

    Dot,
    Semicolon,
    Comma,

    Plus,
    Dash,
    Slash,
    Star,
    Percent,

    // Reserved
    Void,
    Int,
    Double,
    Bool,
    StringType,
    Class,
    Null,
    This,
    True,
    False,
    For,
    While,
    If,
    Else,
    Return,
    Break,
    Continue,
    New,
    NewArray,
    Print,
    ReadInteger,
    ReadLine,
    Itod,
    Dtoi,
    Itob,
    Btoi,
}

impl TokenKind {
    /// Keywords naming a primitive type usable in declarations.
    pub fn is_primitive_type(&self) -> bool {
        matches!(
            self,
            TokenKind::Int | TokenKind::Double | TokenKind::Bool | TokenKind::StringType
        )
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub span: Span,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token {{\nkind: {},\nvalue: {}}}", self.kind, self.value)
    }
}

impl Token {
    pub fn is_one_of_many(&self, tokens: &[TokenKind]) -> bool {
        tokens.contains(&self.kind)
    }

    pub fn debug(&self) -> String {
        if self.is_one_of_many(&[
            TokenKind::String,
            TokenKind::Identifier,
            TokenKind::IntLiteral,
            TokenKind::DoubleLiteral,
        ]) {
            format!("{} ({})", self.kind, self.value)
        } else {
            format!("{} ()", self.kind)
        }
    }
}
