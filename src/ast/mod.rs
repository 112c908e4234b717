/// AST (Abstract Syntax Tree) module
/// Contains all definitions related to the AST structure
///
/// Submodules:
/// - ast: Program, declarations, and the statement/expression node wrappers
/// - expressions: Definitions for the expression kinds and operators
/// - statements: Definitions for the statement kinds
/// - types: Type syntax as written in declarations
pub mod ast;
pub mod expressions;
pub mod statements;
pub mod types;
