use crate::Span;

use super::{expressions::ExprKind, statements::{BlockStmt, StmtKind}, types::TypeSyntax};

/// Parser-assigned identity of a node. Later passes key their side tables on it.
pub type NodeId = u32;

/// A whole compilation unit: the ordered top-level declarations.
#[derive(Debug, Clone)]
pub struct Program {
    pub decls: Vec<Decl>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Variable(VarDecl),
    Function(FnDecl),
    Class(ClassDecl),
}

impl Decl {
    pub fn get_span(&self) -> &Span {
        match self {
            Decl::Variable(decl) => &decl.span,
            Decl::Function(decl) => &decl.span,
            Decl::Class(decl) => &decl.span,
        }
    }
}

/// `Type name;`, also used for formals and class fields.
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub id: NodeId,
    pub name: String,
    pub type_: TypeSyntax,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FnDecl {
    pub id: NodeId,
    pub name: String,
    /// `None` for the `void` keyword form.
    pub return_type: Option<TypeSyntax>,
    pub formals: Vec<VarDecl>,
    pub body: BlockStmt,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub id: NodeId,
    pub name: String,
    pub members: Vec<ClassMember>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ClassMember {
    Variable(VarDecl),
    Method(FnDecl),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    /// Only plain names, field accesses and array elements can be stored to.
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Identifier(_) | ExprKind::Field(_) | ExprKind::Index(_)
        )
    }
}
