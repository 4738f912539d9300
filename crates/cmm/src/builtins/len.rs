//! Implementation of the len() builtin function.

use crate::{
    bytecode::{CodeBuilder, CompileError, Opcode},
    expressions::{Call, Expr, Place},
};

/// Implementation of the len() builtin function.
///
/// Emits `length <name>`. The argument must be a single plain variable; indexed
/// places and arbitrary expressions are rejected because `length` reads a binding.
pub(super) fn builtin_len(call: &Call, builder: &mut CodeBuilder) -> Result<(), CompileError> {
    match call.args.as_slice() {
        [Expr::Place(Place { name, indices, .. })] if indices.is_empty() => {
            builder.emit_arg(Opcode::Length, name.as_str());
            Ok(())
        }
        [_] => Err(CompileError::new(
            "len() expects a plain array variable as its argument",
            Some(call.loc),
        )),
        args => Err(CompileError::new(
            format!("len() takes exactly 1 argument ({} given)", args.len()),
            Some(call.loc),
        )),
    }
}
