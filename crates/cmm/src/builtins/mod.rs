//! Builtin functions, resolved by name at code-generation time.
//!
//! A builtin intercepts a call before it becomes a `call` instruction and emits
//! specialized bytecode instead. Builtins are not labels and cannot be called
//! from hand-written bytecode.

mod len;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    bytecode::{CodeBuilder, CompileError},
    expressions::Call,
};

/// Enumerates every builtin function.
///
/// All variants serialize to lowercase (e.g., `Len` -> "len").
#[derive(Debug, Clone, Copy, Display, EnumString, IntoStaticStr, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Builtins {
    Len,
}

impl Builtins {
    /// Looks up a builtin by the name used at the call site.
    pub fn lookup(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// Whether the emitted code leaves a result on the operand stack.
    pub fn yields_value(self) -> bool {
        match self {
            Self::Len => true,
        }
    }

    /// Emits the specialized instructions for `call`.
    pub fn emit(self, call: &Call, builder: &mut CodeBuilder) -> Result<(), CompileError> {
        match self {
            Self::Len => len::builtin_len(call, builder),
        }
    }
}
