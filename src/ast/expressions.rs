use std::fmt::Display;

use crate::Position;

use super::{ast::Expr, types::TypeSyntax};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    Equals,
    NotEquals,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide
        )
    }

    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOp::Less | BinaryOp::LessEquals | BinaryOp::Greater | BinaryOp::GreaterEquals
        )
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, BinaryOp::Equals | BinaryOp::NotEquals)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Less => "<",
            BinaryOp::LessEquals => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEquals => ">=",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Negate,
    Not,
}

impl Display for PrefixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefixOp::Negate => write!(f, "-"),
            PrefixOp::Not => write!(f, "!"),
        }
    }
}

/// The four built-in conversion functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Itod,
    Dtoi,
    Itob,
    Btoi,
}

impl Display for Conversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Conversion::Itod => "itod",
            Conversion::Dtoi => "dtoi",
            Conversion::Itob => "itob",
            Conversion::Btoi => "btoi",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub left: Box<Expr>,
    pub operator: BinaryOp,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone)]
pub struct PrefixExpr {
    pub operator: PrefixOp,
    pub operand: Box<Expr>,
}

#[derive(Debug, Clone)]
pub struct AssignmentExpr {
    pub assignee: Box<Expr>,
    pub value: Box<Expr>,
}

/// `name(args)` or `receiver.name(args)`.
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub receiver: Option<Box<Expr>>,
    pub name: String,
    pub name_position: Position,
    pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct FieldExpr {
    pub object: Box<Expr>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct IndexExpr {
    pub array: Box<Expr>,
    pub index: Box<Expr>,
}

#[derive(Debug, Clone)]
pub struct NewArrayExpr {
    pub size: Box<Expr>,
    pub element_type: TypeSyntax,
}

#[derive(Debug, Clone)]
pub struct ConversionExpr {
    pub conversion: Conversion,
    pub operand: Box<Expr>,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLiteral(i32),
    DoubleLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(String),
    Null,
    This,
    Identifier(String),
    Binary(BinaryExpr),
    Prefix(PrefixExpr),
    Assignment(AssignmentExpr),
    Call(CallExpr),
    Field(FieldExpr),
    Index(IndexExpr),
    NewObject(String),
    NewArray(NewArrayExpr),
    Conversion(ConversionExpr),
    ReadInteger,
    ReadLine,
}

impl ExprKind {
    /// The value of an integer constant, looking through unary minus.
    pub fn constant_int(&self) -> Option<i64> {
        match self {
            ExprKind::IntLiteral(value) => Some(*value as i64),
            ExprKind::Prefix(PrefixExpr {
                operator: PrefixOp::Negate,
                operand,
            }) => operand.kind.constant_int().map(|value| -value),
            _ => None,
        }
    }
}
