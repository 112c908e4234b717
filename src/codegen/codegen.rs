//! Main code generation module.
//!
//! This module contains the [`CodeGenerator`] structure and the function
//! level lowering: prologue, formal copying, body and epilogue. Expressions
//! and statements are lowered by [`gen_expression`](super::expr::gen_expression)
//! and [`gen_statement`](super::stmt::gen_statement).
//!
//! Every expression leaves its value on the runtime stack (`$sp`), one word
//! per value. The generator mirrors that stack at compile time with a
//! *shadow stack* of [`Type`]s, which both type-checks operands and picks
//! the type-specific instructions to emit.

use std::rc::Rc;

use log::debug;

use crate::{
    ast::{
        ast::{ClassMember, Decl, FnDecl, NodeId, Program},
        types::TypeSyntax,
    },
    errors::errors::{Error, ErrorImpl},
    semantic::{
        context::CompilationContext,
        scope::{Function, ScopeId, Storage, Type, Variable},
        scope_builder::ScopeAnalysis,
    },
    Position,
};

use super::{runtime, stmt::gen_statement};

/// Bytes of the register save area at the bottom of every frame:
/// `$s0`-`$s7`, then the caller's `$fp`, then `$ra`.
pub const SAVE_AREA: u32 = 40;
const SAVED_FP: u32 = 32;
const SAVED_RA: u32 = 36;

/// The state of one code generation walk.
///
/// This structure holds:
/// - The scope analysis produced by the first pass (read only)
/// - The compilation context with the label counter
/// - The emitted instruction text and string literal table
/// - The shadow operand stack and the loop label stack
pub struct CodeGenerator<'a> {
    /// Scope tree and node annotations from the scope builder
    pub analysis: &'a ScopeAnalysis,
    /// Counters shared with the scope builder
    pub ctx: &'a mut CompilationContext,
    /// Types of the values currently on the runtime stack, top last
    pub shadow: Vec<Type>,
    /// `(continue label, break label)` of each enclosing loop, innermost last
    pub loops: Vec<(String, String)>,
    /// The function whose body is being generated
    pub current_function: Option<Rc<Function>>,
    text: String,
    strings: Vec<String>,
}

impl<'a> CodeGenerator<'a> {
    /// Creates a generator with empty output and empty stacks.
    pub fn new(analysis: &'a ScopeAnalysis, ctx: &'a mut CompilationContext) -> Self {
        CodeGenerator {
            analysis,
            ctx,
            shadow: vec![],
            loops: vec![],
            current_function: None,
            text: String::new(),
            strings: vec![],
        }
    }

    /// Appends one instruction.
    pub fn emit(&mut self, instruction: impl AsRef<str>) {
        self.text.push('\t');
        self.text.push_str(instruction.as_ref());
        self.text.push('\n');
    }

    /// Appends a label definition.
    pub fn emit_label(&mut self, label: impl AsRef<str>) {
        self.text.push_str(label.as_ref());
        self.text.push_str(":\n");
    }

    /// The instruction text emitted so far.
    #[cfg(test)]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Pushes a general purpose register and records its type.
    pub fn push(&mut self, register: &str, type_: Type) {
        self.emit("subu $sp, $sp, 4");
        self.emit(format!("sw {}, 0($sp)", register));
        self.shadow.push(type_);
    }

    /// Pushes a floating point register and records its type.
    pub fn push_float(&mut self, register: &str, type_: Type) {
        self.emit("subu $sp, $sp, 4");
        self.emit(format!("s.s {}, 0($sp)", register));
        self.shadow.push(type_);
    }

    /// Pops the top word into a general purpose register.
    pub fn pop(&mut self, register: &str, position: &Position) -> Result<Type, Error> {
        let type_ = self.pop_shadow(position)?;
        self.emit(format!("lw {}, 0($sp)", register));
        self.emit("addu $sp, $sp, 4");
        Ok(type_)
    }

    /// Pops the top word into a floating point register.
    pub fn pop_float(&mut self, register: &str, position: &Position) -> Result<Type, Error> {
        let type_ = self.pop_shadow(position)?;
        self.emit(format!("l.s {}, 0($sp)", register));
        self.emit("addu $sp, $sp, 4");
        Ok(type_)
    }

    /// Drops `count` words from the runtime stack without reading them.
    pub fn discard(&mut self, count: usize, position: &Position) -> Result<(), Error> {
        if count == 0 {
            return Ok(());
        }
        for _ in 0..count {
            self.pop_shadow(position)?;
        }
        self.emit(format!("addu $sp, $sp, {}", 4 * count));
        Ok(())
    }

    fn pop_shadow(&mut self, position: &Position) -> Result<Type, Error> {
        self.shadow
            .pop()
            .ok_or_else(|| internal_error("shadow stack underflow", position))
    }

    /// The scope the scope builder recorded for a node.
    pub fn scope_of(&self, id: NodeId, position: &Position) -> Result<ScopeId, Error> {
        self.analysis
            .scope_of(id)
            .ok_or_else(|| internal_error(&format!("node {} has no scope", id), position))
    }

    /// Resolves written type syntax, honouring the array capability.
    pub fn resolve_type(&self, scope: ScopeId, syntax: &TypeSyntax) -> Result<Type, Error> {
        if syntax.is_array() {
            self.ctx.require_arrays(syntax.position())?;
        }
        self.analysis.tree.resolve(scope, syntax)
    }

    /// Registers a string literal and returns its data label.
    pub fn string_label(&mut self, value: &str) -> String {
        let label = format!("str_{}", self.strings.len());
        self.strings.push(value.to_string());
        label
    }

    /// Loads a variable's value into `register`. `$t8` is clobbered for fields.
    pub fn load_variable(
        &mut self,
        variable: &Variable,
        scope: ScopeId,
        register: &str,
        position: &Position,
    ) -> Result<(), Error> {
        let address = self.address_of(variable, scope, position)?;
        self.emit(format!("lw {}, {}", register, address));
        Ok(())
    }

    /// Stores `register` into a variable. `$t8` is clobbered for fields.
    pub fn store_variable(
        &mut self,
        variable: &Variable,
        scope: ScopeId,
        register: &str,
        position: &Position,
    ) -> Result<(), Error> {
        let address = self.address_of(variable, scope, position)?;
        self.emit(format!("sw {}, {}", register, address));
        Ok(())
    }

    /// The addressing-mode operand for a variable. Fields first load `this`
    /// into `$t8`.
    fn address_of(
        &mut self,
        variable: &Variable,
        scope: ScopeId,
        position: &Position,
    ) -> Result<String, Error> {
        match variable.storage {
            Storage::Static(offset) => Ok(format!("{}($gp)", offset)),
            Storage::Frame(offset) => Ok(format!("{}($fp)", offset)),
            Storage::Field(offset) => {
                let this = self.analysis.tree.find_var(scope, "this", position)?;
                let this_address = match this.storage {
                    Storage::Static(offset) => format!("{}($gp)", offset),
                    Storage::Frame(offset) => format!("{}($fp)", offset),
                    Storage::Field(_) => {
                        return Err(internal_error("`this` stored in a field", position))
                    }
                };
                self.emit(format!("lw $t8, {}", this_address));
                Ok(format!("{}($t8)", offset))
            }
        }
    }

    /// Generates one function or method: prologue, formal copies, body, epilogue.
    fn gen_function(&mut self, decl: &FnDecl) -> Result<(), Error> {
        let function = self
            .analysis
            .function_of(decl.id)
            .cloned()
            .ok_or_else(|| internal_error("function was never declared", &decl.span.start))?;
        debug!("generating {} as {}", function.name, function.label);

        self.emit_label(&function.label);

        // Prologue
        self.emit(format!("subu $sp, $sp, {}", SAVE_AREA));
        for register in 0..8 {
            self.emit(format!("sw $s{}, {}($sp)", register, register * 4));
        }
        self.emit(format!("sw $fp, {}($sp)", SAVED_FP));
        self.emit(format!("sw $ra, {}($sp)", SAVED_RA));
        self.emit("move $fp, $sp");
        if function.frame_size > 0 {
            self.emit(format!("subu $sp, $sp, {}", function.frame_size));
        }

        // The caller pushed actuals in order, so the last one is nearest $fp
        let count = function.formals.len();
        for (index, formal) in function.formals.iter().enumerate() {
            let slot = SAVE_AREA as usize + 4 * (count - 1 - index);
            self.emit(format!("lw $t0, {}($fp)", slot));
            match formal.storage {
                Storage::Static(offset) => self.emit(format!("sw $t0, {}($gp)", offset)),
                Storage::Frame(offset) => self.emit(format!("sw $t0, {}($fp)", offset)),
                Storage::Field(_) => {
                    return Err(internal_error("formal stored in a field", &decl.span.start))
                }
            }
        }

        self.current_function = Some(Rc::clone(&function));
        self.loops.clear();
        for stmt in &decl.body.body {
            gen_statement(self, stmt)?;
        }
        self.current_function = None;

        if !self.shadow.is_empty() {
            return Err(internal_error(
                "values left on the shadow stack at function end",
                &decl.span.end,
            ));
        }

        // Epilogue
        self.emit_label(function.end_label());
        if function.is_entry_point() {
            self.emit("li $v0, 10");
            self.emit("syscall");
            return Ok(());
        }

        self.emit("move $sp, $fp");
        for register in 0..8 {
            self.emit(format!("lw $s{}, {}($sp)", register, register * 4));
        }
        self.emit(format!("lw $ra, {}($sp)", SAVED_RA));
        self.emit(format!("lw $fp, {}($sp)", SAVED_FP));
        self.emit(format!("addu $sp, $sp, {}", SAVE_AREA));
        self.emit("jr $ra");

        Ok(())
    }

    /// Assembles the final program text.
    fn finish(self) -> String {
        let mut out = String::new();
        out.push_str("\t.text\n\t.globl main\n");
        out.push_str(&self.text);
        out.push_str(&runtime::text());
        out.push_str("\t.data\n");
        for (index, value) in self.strings.iter().enumerate() {
            out.push_str(&format!("str_{}:\t.asciiz \"{}\"\n", index, escape_asciiz(value)));
        }
        out.push_str(&runtime::data());
        out
    }
}

pub fn internal_error(message: &str, position: &Position) -> Error {
    Error::new(
        ErrorImpl::InternalError {
            message: message.to_string(),
        },
        position.clone(),
    )
}

/// Escapes a string for an `.asciiz` directive.
pub fn escape_asciiz(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out
}

/// Generates assembly for a program whose scopes have already been built.
///
/// Functions and methods are emitted in declaration order, followed by the
/// runtime helpers and the data section. The first error aborts generation.
pub fn generate(
    program: &Program,
    analysis: &ScopeAnalysis,
    ctx: &mut CompilationContext,
) -> Result<String, Error> {
    let mut generator = CodeGenerator::new(analysis, ctx);

    for decl in &program.decls {
        match decl {
            Decl::Variable(_) => {}
            Decl::Function(function) => generator.gen_function(function)?,
            Decl::Class(class) => {
                for member in &class.members {
                    if let ClassMember::Method(method) = member {
                        generator.gen_function(method)?;
                    }
                }
            }
        }
    }

    Ok(generator.finish())
}
