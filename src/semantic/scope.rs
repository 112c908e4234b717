use std::{collections::HashMap, fmt::Display, rc::Rc};

use log::trace;

use crate::{
    ast::types::TypeSyntax,
    errors::errors::{Error, ErrorImpl},
    Position,
};

pub type ScopeId = usize;
pub type ClassId = usize;

/// A handle on a class registered in the [`ScopeTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRef {
    pub id: ClassId,
    pub name: Rc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Double,
    Bool,
    String,
    Void,
    /// The type of the `null` literal.
    Null,
    Array(Box<Type>),
    Class(ClassRef),
}

impl Type {
    /// Bytes one value occupies. Every value is a single word; strings,
    /// arrays and objects are heap pointers.
    pub fn size(&self) -> u32 {
        match self {
            Type::Void => 0,
            _ => 4,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Array(_) | Type::Class(_) | Type::Null)
    }

    /// Whether a value of type `other` can be stored where `self` is expected.
    pub fn accepts(&self, other: &Type) -> bool {
        self == other || (*other == Type::Null && matches!(self, Type::Array(_) | Type::Class(_)))
    }

    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(element) => Some(element),
            _ => None,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Double => write!(f, "double"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::Void => write!(f, "void"),
            Type::Null => write!(f, "null"),
            Type::Array(element) => write!(f, "{}[]", element),
            Type::Class(class) => write!(f, "{}", class.name),
        }
    }
}

/// Where a variable's word lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// `offset($gp)`
    Static(u32),
    /// `offset($fp)`, negative for formals and locals
    Frame(i32),
    /// `offset(this)` for class data members
    Field(u32),
}

impl Display for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Storage::Static(offset) => write!(f, "{}($gp)", offset),
            Storage::Frame(offset) => write!(f, "{}($fp)", offset),
            Storage::Field(offset) => write!(f, "this+{}", offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub type_: Type,
    pub storage: Storage,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub label: String,
    pub return_type: Type,
    /// In calling-convention order. Methods start with `this`.
    pub formals: Vec<Rc<Variable>>,
    pub class: Option<ClassRef>,
    /// Bytes of frame-resident formals and locals below `$fp`.
    pub frame_size: u32,
    pub position: Position,
}

impl Function {
    /// Label of the shared epilogue every `return` jumps to.
    pub fn end_label(&self) -> String {
        format!("{}.end", self.label)
    }

    pub fn is_method(&self) -> bool {
        self.class.is_some()
    }

    pub fn is_entry_point(&self) -> bool {
        self.label == "main"
    }
}

#[derive(Debug, Clone)]
pub struct Class {
    pub id: ClassId,
    pub name: Rc<str>,
    pub members: HashMap<String, Rc<Variable>>,
    pub methods: HashMap<String, Rc<Function>>,
    /// Instance size in bytes: the vtable placeholder word plus one word per member.
    pub size: u32,
}

impl Class {
    pub fn class_ref(&self) -> ClassRef {
        ClassRef {
            id: self.id,
            name: Rc::clone(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    Root,
    Formals(String),
    Body(String),
    Branch,
    Loop,
    ForClauses,
    Class(String),
}

impl Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeKind::Root => write!(f, "root"),
            ScopeKind::Formals(name) => write!(f, "formals of {}", name),
            ScopeKind::Body(name) => write!(f, "body of {}", name),
            ScopeKind::Branch => write!(f, "branch"),
            ScopeKind::Loop => write!(f, "loop body"),
            ScopeKind::ForClauses => write!(f, "for clauses"),
            ScopeKind::Class(name) => write!(f, "class {}", name),
        }
    }
}

#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    variables: HashMap<String, Rc<Variable>>,
    functions: HashMap<String, Rc<Function>>,
    types: HashMap<String, Type>,
}

impl Scope {
    fn new(id: ScopeId, parent: Option<ScopeId>, kind: ScopeKind) -> Self {
        Scope {
            id,
            parent,
            kind,
            variables: HashMap::new(),
            functions: HashMap::new(),
            types: HashMap::new(),
        }
    }

    pub fn get_variable(&self, name: &str) -> Option<&Rc<Variable>> {
        self.variables.get(name)
    }

    pub fn get_function(&self, name: &str) -> Option<&Rc<Function>> {
        self.functions.get(name)
    }

    pub fn get_type(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }
}

/// Arena of scopes and classes built by the scope builder.
///
/// Lookups walk from the given scope toward the root and the nearest match
/// wins. Inserts only check the target scope, so inner declarations may
/// shadow outer ones but never collide with a sibling in the same scope.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    classes: Vec<Class>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// A tree holding only the root scope, seeded with the primitive types.
    pub fn new() -> Self {
        let mut root = Scope::new(0, None, ScopeKind::Root);
        for (name, type_) in [
            ("int", Type::Int),
            ("double", Type::Double),
            ("bool", Type::Bool),
            ("string", Type::String),
            ("void", Type::Void),
        ] {
            root.types.insert(String::from(name), type_);
        }

        ScopeTree {
            scopes: vec![root],
            classes: vec![],
        }
    }

    pub fn root(&self) -> ScopeId {
        0
    }

    pub fn add_scope(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = self.scopes.len();
        trace!("scope {} ({}) opened under {}", id, kind, parent);
        self.scopes.push(Scope::new(id, Some(parent), kind));
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// The scope itself followed by each of its ancestors.
    pub fn chain(&self, id: ScopeId) -> impl Iterator<Item = &Scope> {
        std::iter::successors(Some(&self.scopes[id]), move |scope| {
            scope.parent.map(|parent| &self.scopes[parent])
        })
    }

    pub fn add_var(&mut self, scope: ScopeId, variable: Variable) -> Result<Rc<Variable>, Error> {
        let variables = &mut self.scopes[scope].variables;
        if variables.contains_key(&variable.name) {
            return Err(Error::new(
                ErrorImpl::VariableAlreadyDeclared {
                    variable: variable.name,
                },
                variable.position,
            ));
        }

        let variable = Rc::new(variable);
        variables.insert(variable.name.clone(), Rc::clone(&variable));
        Ok(variable)
    }

    pub fn add_func(&mut self, scope: ScopeId, function: Function) -> Result<Rc<Function>, Error> {
        let functions = &mut self.scopes[scope].functions;
        if functions.contains_key(&function.name) {
            return Err(Error::new(
                ErrorImpl::FunctionAlreadyDeclared {
                    function: function.name,
                },
                function.position,
            ));
        }

        let function = Rc::new(function);
        functions.insert(function.name.clone(), Rc::clone(&function));
        Ok(function)
    }

    pub fn add_type(
        &mut self,
        scope: ScopeId,
        name: &str,
        type_: Type,
        position: &Position,
    ) -> Result<(), Error> {
        let types = &mut self.scopes[scope].types;
        if types.contains_key(name) {
            return Err(Error::new(
                ErrorImpl::TypeAlreadyDeclared {
                    type_: name.to_string(),
                },
                position.clone(),
            ));
        }

        types.insert(name.to_string(), type_);
        Ok(())
    }

    pub fn find_var(
        &self,
        scope: ScopeId,
        name: &str,
        position: &Position,
    ) -> Result<Rc<Variable>, Error> {
        self.chain(scope)
            .find_map(|scope| scope.get_variable(name))
            .cloned()
            .ok_or_else(|| {
                Error::new(
                    ErrorImpl::VariableNotDeclared {
                        variable: name.to_string(),
                    },
                    position.clone(),
                )
            })
    }

    pub fn find_func(
        &self,
        scope: ScopeId,
        name: &str,
        position: &Position,
    ) -> Result<Rc<Function>, Error> {
        self.chain(scope)
            .find_map(|scope| scope.get_function(name))
            .cloned()
            .ok_or_else(|| {
                Error::new(
                    ErrorImpl::FunctionNotDeclared {
                        function: name.to_string(),
                    },
                    position.clone(),
                )
            })
    }

    pub fn find_type(&self, scope: ScopeId, name: &str, position: &Position) -> Result<Type, Error> {
        self.chain(scope)
            .find_map(|scope| scope.get_type(name))
            .cloned()
            .ok_or_else(|| {
                Error::new(
                    ErrorImpl::UnknownType {
                        type_: name.to_string(),
                    },
                    position.clone(),
                )
            })
    }

    /// Resolves written type syntax against `scope`.
    pub fn resolve(&self, scope: ScopeId, syntax: &TypeSyntax) -> Result<Type, Error> {
        match syntax {
            TypeSyntax::Named { name, position } => self.find_type(scope, name, position),
            TypeSyntax::Array(element) => Ok(Type::Array(Box::new(self.resolve(scope, element)?))),
        }
    }

    /// Registers an empty class. Members are filled in by [`ScopeTree::freeze_class`].
    pub fn declare_class(&mut self, name: &str) -> ClassRef {
        let class = Class {
            id: self.classes.len(),
            name: Rc::from(name),
            members: HashMap::new(),
            methods: HashMap::new(),
            size: 4,
        };
        let class_ref = class.class_ref();
        self.classes.push(class);
        class_ref
    }

    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id]
    }

    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    /// Copies the members accumulated in a class-body scope into the class.
    pub fn freeze_class(
        &mut self,
        id: ClassId,
        body: ScopeId,
        position: &Position,
    ) -> Result<(), Error> {
        let scope = &self.scopes[body];
        if let Some(name) = scope
            .functions
            .keys()
            .find(|name| scope.variables.contains_key(*name))
        {
            return Err(Error::new(
                ErrorImpl::DuplicateClassMember {
                    class: self.classes[id].name.to_string(),
                    member: name.clone(),
                },
                position.clone(),
            ));
        }

        let members = scope.variables.clone();
        let methods = scope.functions.clone();

        let class = &mut self.classes[id];
        // The first word is the vtable placeholder
        class.size = 4 + members.values().map(|member| member.type_.size()).sum::<u32>();
        class.members = members;
        class.methods = methods;
        Ok(())
    }

    /// Human-readable listing of every scope, children indented under parents.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_scope(self.root(), 0, &mut out);
        for class in self.classes() {
            out.push_str(&format!("class {}: {} bytes\n", class.name, class.size));
        }
        out
    }

    fn dump_scope(&self, id: ScopeId, depth: usize, out: &mut String) {
        let scope = &self.scopes[id];
        let indent = "  ".repeat(depth);
        out.push_str(&format!("{}scope {} [{}]\n", indent, id, scope.kind));

        let mut types: Vec<_> = scope.types.iter().collect();
        types.sort_by(|a, b| a.0.cmp(b.0));
        for (name, type_) in types {
            out.push_str(&format!("{}  type {} = {}\n", indent, name, type_));
        }

        let mut variables: Vec<_> = scope.variables.values().collect();
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        for variable in variables {
            out.push_str(&format!(
                "{}  var {}: {} @ {}\n",
                indent, variable.name, variable.type_, variable.storage
            ));
        }

        let mut functions: Vec<_> = scope.functions.values().collect();
        functions.sort_by(|a, b| a.name.cmp(&b.name));
        for function in functions {
            let formals: Vec<String> = function
                .formals
                .iter()
                .map(|formal| format!("{} {}", formal.type_, formal.name))
                .collect();
            out.push_str(&format!(
                "{}  func {}({}) -> {} as {}\n",
                indent,
                function.name,
                formals.join(", "),
                function.return_type,
                function.label
            ));
        }

        for child in self.scopes.iter().filter(|scope| scope.parent == Some(id)) {
            self.dump_scope(child.id, depth + 1, out);
        }
    }
}
