use crate::Span;

use super::ast::{Expr, NodeId, Stmt, VarDecl};

#[derive(Debug, Clone)]
pub struct BlockStmt {
    pub id: NodeId,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_body: Box<Stmt>,
    pub else_body: Option<Box<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
}

/// Every clause is optional; an absent one generates nothing.
#[derive(Debug, Clone)]
pub struct ForStmt {
    pub init: Option<Expr>,
    pub condition: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    VarDecl(VarDecl),
    Expression(Expr),
    /// A bare `;`
    Empty,
    Block(BlockStmt),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Break,
    Continue,
    Return(Option<Expr>),
    Print(Vec<Expr>),
}
