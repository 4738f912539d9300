//! Bytecode module for C--.
//!
//! This module contains the program representation shared by the code generator,
//! the loader, the optimizer passes and the virtual machine.
//!
//! # Module Structure
//!
//! - `op` - Opcode enum definitions
//! - `code` - Instructions, label table and the `Bytecode` program value
//! - `builder` - CodeBuilder for emitting bytecode during compilation
//! - `compiler` - AST to bytecode compiler
//! - `loader` - text format to `Bytecode`
//! - `vm` - Virtual machine for bytecode execution

pub use code::{Bytecode, ENTRY_LABEL, Instruction, LabelTable};
pub use compiler::{CompileError, Compiler};
pub use loader::{LoadError, LoadErrorKind, load};
pub use op::Opcode;
pub(crate) use builder::CodeBuilder;
pub(crate) use vm::VM;

mod builder;
mod code;
mod compiler;
pub(crate) mod loader;
mod op;
mod vm;
