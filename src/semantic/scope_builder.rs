//! First pass: builds the scope tree and annotates every node with its scope.
//!
//! Declarations are registered here, before any code is generated, so a
//! function or variable can be used textually before its declaration.

use std::{collections::HashMap, rc::Rc};

use log::debug;

use crate::{
    ast::{
        ast::{ClassDecl, ClassMember, Decl, Expr, FnDecl, NodeId, Program, Stmt, VarDecl},
        expressions::ExprKind,
        statements::{BlockStmt, StmtKind},
        types::TypeSyntax,
    },
    driver::options::LocalStorage,
    errors::errors::{Error, ErrorImpl},
};

use super::{
    context::CompilationContext,
    scope::{ClassRef, Function, ScopeId, ScopeKind, ScopeTree, Storage, Type, Variable},
};

/// Output of the scope builder and required input of the code generator.
#[derive(Debug)]
pub struct ScopeAnalysis {
    pub tree: ScopeTree,
    scopes: HashMap<NodeId, ScopeId>,
    functions: HashMap<NodeId, Rc<Function>>,
}

impl ScopeAnalysis {
    /// The scope a statement, expression or declaration is evaluated in.
    pub fn scope_of(&self, id: NodeId) -> Option<ScopeId> {
        self.scopes.get(&id).copied()
    }

    /// The function created for a function or method declaration.
    pub fn function_of(&self, id: NodeId) -> Option<&Rc<Function>> {
        self.functions.get(&id)
    }
}

/// What kind of site a variable declaration sits at, which decides its storage.
#[derive(Debug, Clone, Copy)]
enum Site {
    Global,
    Local,
    Field(u32),
}

pub fn build_scopes(program: &Program, ctx: &mut CompilationContext) -> Result<ScopeAnalysis, Error> {
    let mut builder = ScopeBuilder {
        ctx,
        tree: ScopeTree::new(),
        scopes: HashMap::new(),
        functions: HashMap::new(),
        frame_offset: 0,
    };

    let root = builder.tree.root();
    for decl in &program.decls {
        match decl {
            Decl::Variable(decl) => {
                builder.declare_variable(root, decl, Site::Global)?;
            }
            Decl::Function(decl) => {
                builder.declare_function(root, decl, None)?;
            }
            Decl::Class(decl) => builder.declare_class(root, decl)?,
        }
    }

    let has_main = builder
        .tree
        .scope(root)
        .get_function("main")
        .is_some();
    if !has_main {
        return Err(Error::new(
            ErrorImpl::MissingEntryPoint,
            program.span.start.clone(),
        ));
    }

    debug!(
        "scope builder finished: {} scopes, {} bytes of static data",
        builder.tree.scope_count(),
        builder.ctx.static_size()
    );

    Ok(ScopeAnalysis {
        tree: builder.tree,
        scopes: builder.scopes,
        functions: builder.functions,
    })
}

struct ScopeBuilder<'a> {
    ctx: &'a mut CompilationContext,
    tree: ScopeTree,
    scopes: HashMap<NodeId, ScopeId>,
    functions: HashMap<NodeId, Rc<Function>>,
    /// Next free frame slot of the function being declared, as a negative `$fp` offset.
    frame_offset: i32,
}

impl<'a> ScopeBuilder<'a> {
    fn annotate(&mut self, id: NodeId, scope: ScopeId) {
        self.scopes.insert(id, scope);
    }

    fn resolve(&self, scope: ScopeId, syntax: &TypeSyntax) -> Result<Type, Error> {
        if syntax.is_array() {
            self.ctx.require_arrays(syntax.position())?;
        }
        self.tree.resolve(scope, syntax)
    }

    fn storage_for(&mut self, site: Site) -> Storage {
        match site {
            Site::Global => Storage::Static(self.ctx.allocate_static()),
            Site::Field(index) => Storage::Field(4 + 4 * index),
            Site::Local => match self.ctx.options.local_storage {
                LocalStorage::Static => Storage::Static(self.ctx.allocate_static()),
                LocalStorage::Frame => {
                    self.frame_offset -= 4;
                    Storage::Frame(self.frame_offset)
                }
            },
        }
    }

    /// Resolves the declared type, assigns storage and registers the variable.
    fn declare_variable(
        &mut self,
        scope: ScopeId,
        decl: &VarDecl,
        site: Site,
    ) -> Result<Rc<Variable>, Error> {
        self.annotate(decl.id, scope);
        let type_ = self.resolve(scope, &decl.type_)?;
        if type_ == Type::Void {
            return Err(Error::new(
                ErrorImpl::TypeMatchError {
                    expected: String::from("a value type"),
                    received: type_.to_string(),
                },
                decl.span.start.clone(),
            ));
        }

        let storage = self.storage_for(site);
        debug!("variable {}: {} at {}", decl.name, type_, storage);

        self.tree.add_var(
            scope,
            Variable {
                name: decl.name.clone(),
                type_,
                storage,
                position: decl.span.start.clone(),
            },
        )
    }

    fn declare_function(
        &mut self,
        scope: ScopeId,
        decl: &FnDecl,
        class: Option<ClassRef>,
    ) -> Result<Rc<Function>, Error> {
        self.annotate(decl.id, scope);

        let return_type = match &decl.return_type {
            Some(syntax) => self.resolve(scope, syntax)?,
            None => Type::Void,
        };

        let saved_frame_offset = self.frame_offset;
        self.frame_offset = 0;

        let formals_scope = self.tree.add_scope(scope, ScopeKind::Formals(decl.name.clone()));
        let mut formals = vec![];

        if let Some(class) = &class {
            let storage = self.storage_for(Site::Local);
            formals.push(self.tree.add_var(
                formals_scope,
                Variable {
                    name: String::from("this"),
                    type_: Type::Class(class.clone()),
                    storage,
                    position: decl.span.start.clone(),
                },
            )?);
        }

        for formal in &decl.formals {
            formals.push(self.declare_variable(formals_scope, formal, Site::Local)?);
        }

        let body_scope = self.tree.add_scope(formals_scope, ScopeKind::Body(decl.name.clone()));
        self.visit_block(&decl.body, body_scope)?;

        let frame_size = (-self.frame_offset) as u32;
        self.frame_offset = saved_frame_offset;

        // Identifiers cannot contain `.`, so the parts of a label never run together
        let label = match &class {
            Some(class) => format!("method.{}.{}", class.name, decl.name),
            None if decl.name == "main" && scope == self.tree.root() => String::from("main"),
            None => format!("func.{}", decl.name),
        };
        debug!(
            "function {} -> {} with {} formals as {}",
            decl.name,
            return_type,
            formals.len(),
            label
        );

        let function = self.tree.add_func(
            scope,
            Function {
                name: decl.name.clone(),
                label,
                return_type,
                formals,
                class,
                frame_size,
                position: decl.span.start.clone(),
            },
        )?;
        self.functions.insert(decl.id, Rc::clone(&function));
        Ok(function)
    }

    fn declare_class(&mut self, scope: ScopeId, decl: &ClassDecl) -> Result<(), Error> {
        self.ctx.require_classes(&decl.span.start)?;
        self.annotate(decl.id, scope);

        let class = self.tree.declare_class(&decl.name);
        self.tree
            .add_type(scope, &decl.name, Type::Class(class.clone()), &decl.span.start)?;

        let body = self.tree.add_scope(scope, ScopeKind::Class(decl.name.clone()));
        let mut field_index = 0;
        for member in &decl.members {
            match member {
                ClassMember::Variable(field) => {
                    self.declare_variable(body, field, Site::Field(field_index))?;
                    field_index += 1;
                }
                ClassMember::Method(method) => {
                    self.declare_function(body, method, Some(class.clone()))?;
                }
            }
        }

        self.tree.freeze_class(class.id, body, &decl.span.start)?;
        debug!(
            "class {} frozen at {} bytes",
            decl.name,
            self.tree.class(class.id).size
        );
        Ok(())
    }

    fn visit_block(&mut self, block: &BlockStmt, scope: ScopeId) -> Result<(), Error> {
        self.annotate(block.id, scope);
        for stmt in &block.body {
            self.visit_stmt(stmt, scope)?;
        }
        Ok(())
    }

    /// Visits a branch or loop body in a fresh child of `parent`.
    fn visit_child_body(&mut self, stmt: &Stmt, parent: ScopeId, kind: ScopeKind) -> Result<(), Error> {
        let scope = self.tree.add_scope(parent, kind);
        self.visit_stmt(stmt, scope)
    }

    fn visit_stmt(&mut self, stmt: &Stmt, scope: ScopeId) -> Result<(), Error> {
        self.annotate(stmt.id, scope);

        match &stmt.kind {
            StmtKind::VarDecl(decl) => {
                self.declare_variable(scope, decl, Site::Local)?;
            }
            StmtKind::Expression(expr) => self.visit_expr(expr, scope),
            StmtKind::Empty | StmtKind::Break | StmtKind::Continue => {}
            // A bare block shares the enclosing scope
            StmtKind::Block(block) => self.visit_block(block, scope)?,
            StmtKind::If(stmt) => {
                self.visit_expr(&stmt.condition, scope);
                self.visit_child_body(&stmt.then_body, scope, ScopeKind::Branch)?;
                if let Some(else_body) = &stmt.else_body {
                    self.visit_child_body(else_body, scope, ScopeKind::Branch)?;
                }
            }
            StmtKind::While(stmt) => {
                self.visit_expr(&stmt.condition, scope);
                self.visit_child_body(&stmt.body, scope, ScopeKind::Loop)?;
            }
            StmtKind::For(stmt) => {
                let clauses = self.tree.add_scope(scope, ScopeKind::ForClauses);
                for clause in [&stmt.init, &stmt.condition, &stmt.update].into_iter().flatten() {
                    self.visit_expr(clause, clauses);
                }
                self.visit_child_body(&stmt.body, clauses, ScopeKind::Loop)?;
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.visit_expr(value, scope);
                }
            }
            StmtKind::Print(arguments) => {
                for argument in arguments {
                    self.visit_expr(argument, scope);
                }
            }
        }

        Ok(())
    }

    /// Expressions declare nothing; they only inherit their parent's scope.
    fn visit_expr(&mut self, expr: &Expr, scope: ScopeId) {
        self.annotate(expr.id, scope);

        match &expr.kind {
            ExprKind::IntLiteral(_)
            | ExprKind::DoubleLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::Null
            | ExprKind::This
            | ExprKind::Identifier(_)
            | ExprKind::NewObject(_)
            | ExprKind::ReadInteger
            | ExprKind::ReadLine => {}
            ExprKind::Binary(binary) => {
                self.visit_expr(&binary.left, scope);
                self.visit_expr(&binary.right, scope);
            }
            ExprKind::Prefix(prefix) => self.visit_expr(&prefix.operand, scope),
            ExprKind::Assignment(assignment) => {
                self.visit_expr(&assignment.assignee, scope);
                self.visit_expr(&assignment.value, scope);
            }
            ExprKind::Call(call) => {
                if let Some(receiver) = &call.receiver {
                    self.visit_expr(receiver, scope);
                }
                for argument in &call.arguments {
                    self.visit_expr(argument, scope);
                }
            }
            ExprKind::Field(field) => self.visit_expr(&field.object, scope),
            ExprKind::Index(index) => {
                self.visit_expr(&index.array, scope);
                self.visit_expr(&index.index, scope);
            }
            ExprKind::NewArray(array) => self.visit_expr(&array.size, scope),
            ExprKind::Conversion(conversion) => self.visit_expr(&conversion.operand, scope),
        }
    }
}
