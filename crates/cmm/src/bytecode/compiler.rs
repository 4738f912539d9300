//! Lowers the AST to bytecode.
//!
//! Calling convention: the caller pushes arguments in reverse order and emits
//! `call <name>`; the callee's prologue is one `pop <param>` per parameter in
//! declaration order, so the first `pop` takes the first argument. Results come
//! back through `return <n>`.

use std::fmt;

use ahash::AHashMap;

use super::{builder::CodeBuilder, code::Bytecode, op::Opcode};
use crate::{
    builtins::Builtins,
    expressions::{Assign, Block, Call, Expr, FunctionDecl, Place, Program, Stmt},
    parse::CodeLoc,
};

/// The code generator rejected the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub message: String,
    pub loc: Option<CodeLoc>,
}

impl CompileError {
    pub(crate) fn new(message: impl Into<String>, loc: Option<CodeLoc>) -> Self {
        Self {
            message: message.into(),
            loc,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.loc {
            Some(loc) => write!(f, "compile error at {loc}: {}", self.message),
            None => write!(f, "compile error: {}", self.message),
        }
    }
}

impl std::error::Error for CompileError {}

/// AST to bytecode compiler for one program.
#[derive(Debug)]
pub struct Compiler<'p> {
    builder: CodeBuilder,
    /// Whether each declared function leaves a value for its caller.
    yields_value: AHashMap<&'p str, bool>,
}

impl<'p> Compiler<'p> {
    /// Compiles a whole program. Functions are emitted in declaration order.
    pub fn compile(program: &'p Program) -> Result<Bytecode, CompileError> {
        let mut yields_value = AHashMap::with_capacity(program.functions.len());
        for function in &program.functions {
            if yields_value
                .insert(function.name.as_str(), function.yields_value())
                .is_some()
            {
                return Err(CompileError::new(
                    format!("function '{}' is defined more than once", function.name),
                    Some(function.loc),
                ));
            }
        }

        let mut compiler = Self {
            builder: CodeBuilder::new(),
            yields_value,
        };
        for function in &program.functions {
            compiler.compile_function(function)?;
        }
        Ok(compiler.builder.build())
    }

    fn compile_function(&mut self, function: &FunctionDecl) -> Result<(), CompileError> {
        self.builder.place_label(&function.name);
        for param in &function.params {
            self.builder.emit_arg(Opcode::Pop, param.as_str());
        }
        self.compile_block(&function.body)?;

        // never fall through into the next function
        if !function.body.ends_with_return() {
            if function.yields_value() {
                // some path returns a value, so every path must
                self.builder.emit_arg(Opcode::Push, "0");
                self.builder.emit_arg(Opcode::Return, "1");
            } else {
                self.builder.emit_arg(Opcode::Return, "0");
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> Result<(), CompileError> {
        block.statements.iter().try_for_each(|stmt| self.compile_stmt(stmt))
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Print(expr) => {
                self.compile_expr(expr)?;
                self.builder.emit(Opcode::Print);
            }
            Stmt::Return(expr) => {
                self.compile_expr(expr)?;
                self.builder.emit_arg(Opcode::Return, "1");
            }
            Stmt::Assign(assign) => self.compile_assign(assign)?,
            Stmt::ArrayInit { name, size } => {
                self.compile_expr(size)?;
                self.builder.emit_arg(Opcode::Array, name.as_str());
            }
            Stmt::Call(call) => {
                if self.compile_call(call)? {
                    self.builder.emit(Opcode::Pop);
                }
            }
            Stmt::While { condition, body } => {
                let start = self.builder.fresh_label();
                let end = self.builder.fresh_label();
                self.builder.place_label(&start);
                self.compile_expr(condition)?;
                self.builder.emit_arg(Opcode::Jz, end.as_str());
                self.compile_block(body)?;
                self.builder.emit_arg(Opcode::Jmp, start);
                self.builder.place_label(&end);
            }
            Stmt::For {
                init,
                condition,
                step,
                body,
            } => {
                self.compile_assign(init)?;
                let start = self.builder.fresh_label();
                let end = self.builder.fresh_label();
                self.builder.place_label(&start);
                self.compile_expr(condition)?;
                self.builder.emit_arg(Opcode::Jz, end.as_str());
                self.compile_block(body)?;
                self.compile_assign(step)?;
                self.builder.emit_arg(Opcode::Jmp, start);
                self.builder.place_label(&end);
            }
            Stmt::If {
                condition,
                then_block,
                else_block,
            } => {
                let otherwise = self.builder.fresh_label();
                let end = self.builder.fresh_label();
                self.compile_expr(condition)?;
                self.builder.emit_arg(Opcode::Jz, otherwise.as_str());
                self.compile_block(then_block)?;
                if let Some(else_block) = else_block {
                    self.builder.emit_arg(Opcode::Jmp, end.as_str());
                    self.builder.place_label(&otherwise);
                    self.compile_block(else_block)?;
                } else {
                    self.builder.place_label(&otherwise);
                }
                self.builder.place_label(&end);
            }
            Stmt::Block(block) => self.compile_block(block)?,
        }
        Ok(())
    }

    fn compile_assign(&mut self, assign: &Assign) -> Result<(), CompileError> {
        let Assign { target, value } = assign;
        self.compile_expr(value)?;
        match single_index(target)? {
            None => self.builder.emit_arg(Opcode::Pop, target.name.as_str()),
            Some(index) => {
                self.compile_expr(index)?;
                self.builder.emit_array_store(&target.name);
            }
        }
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Int(value) => self.builder.emit_arg(Opcode::Push, value.to_string()),
            Expr::Place(place) => match single_index(place)? {
                None => self.builder.emit_arg(Opcode::Push, place.name.as_str()),
                Some(index) => {
                    self.compile_expr(index)?;
                    self.builder.emit_arg(Opcode::Access, place.name.as_str());
                }
            },
            Expr::Call(call) => {
                self.compile_call(call)?;
            }
            Expr::Neg(operand) => {
                self.compile_expr(operand)?;
                self.builder.emit(Opcode::Neg);
            }
            Expr::Binary { op, lhs, rhs } => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.builder.emit(Opcode::from(*op));
            }
        }
        Ok(())
    }

    /// Emits a call and returns whether it leaves a value on the stack.
    ///
    /// Unknown functions compile to a plain `call`; the VM reports the unresolved label.
    fn compile_call(&mut self, call: &Call) -> Result<bool, CompileError> {
        if let Some(builtin) = Builtins::lookup(&call.name) {
            builtin.emit(call, &mut self.builder)?;
            return Ok(builtin.yields_value());
        }
        for arg in call.args.iter().rev() {
            self.compile_expr(arg)?;
        }
        self.builder.emit_arg(Opcode::Call, call.name.as_str());
        Ok(self.yields_value.get(call.name.as_str()).copied().unwrap_or(false))
    }
}

/// Returns the index of a single-indexed place, `None` for a plain variable.
fn single_index(place: &Place) -> Result<Option<&Expr>, CompileError> {
    match place.indices.as_slice() {
        [] => Ok(None),
        [index] => Ok(Some(index)),
        _ => Err(CompileError::new(
            format!(
                "'{}' is indexed {} times; only one level of indexing is supported",
                place.name,
                place.indices.len()
            ),
            Some(place.loc),
        )),
    }
}
