use std::fmt::Display;

use crate::Position;

/// A type as written in the source. Resolved against a scope later.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSyntax {
    Named { name: String, position: Position },
    Array(Box<TypeSyntax>),
}

impl TypeSyntax {
    pub fn position(&self) -> &Position {
        match self {
            TypeSyntax::Named { position, .. } => position,
            TypeSyntax::Array(underlying) => underlying.position(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeSyntax::Array(_))
    }
}

impl Display for TypeSyntax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeSyntax::Named { name, .. } => write!(f, "{}", name),
            TypeSyntax::Array(underlying) => write!(f, "{}[]", underlying),
        }
    }
}
