//! Opcode definitions for the textual stack bytecode.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::value::BinaryOp;

/// A bytecode opcode.
///
/// Parsing is case-insensitive (`PUSH`, `push` and `Push` are all accepted);
/// `Display` always produces the canonical spelling (`compLT`, `binAnd`, ...).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Opcode {
    /// `push <int>` pushes a fresh integer; `push <name>` pushes the bound handle.
    #[strum(serialize = "push")]
    Push,
    /// `pop` discards, `pop <name>` binds, `pop arr <name>` stores into an array.
    #[strum(serialize = "pop")]
    Pop,
    #[strum(serialize = "print")]
    Print,
    #[strum(serialize = "add")]
    Add,
    #[strum(serialize = "sub")]
    Sub,
    #[strum(serialize = "mul")]
    Mul,
    #[strum(serialize = "div")]
    Div,
    #[strum(serialize = "mod")]
    Mod,
    #[strum(serialize = "compLT")]
    CompLt,
    #[strum(serialize = "compGT")]
    CompGt,
    #[strum(serialize = "compGE")]
    CompGe,
    #[strum(serialize = "compLE")]
    CompLe,
    #[strum(serialize = "compNE")]
    CompNe,
    #[strum(serialize = "compEQ")]
    CompEq,
    /// Pops a value and jumps to the label if it is zero.
    #[strum(serialize = "jz")]
    Jz,
    #[strum(serialize = "jmp")]
    Jmp,
    #[strum(serialize = "neg")]
    Neg,
    #[strum(serialize = "call")]
    Call,
    /// `return <n>` hands the top `n` values back to the caller.
    #[strum(serialize = "return")]
    Return,
    /// `array <name>` pops a size and binds a zero-filled array.
    #[strum(serialize = "array")]
    Array,
    /// `access <name>` pops an index and pushes the element.
    #[strum(serialize = "access")]
    Access,
    /// `length <name>` pushes the element count of a bound array.
    #[strum(serialize = "length")]
    Length,
    #[strum(serialize = "binAnd")]
    BinAnd,
    #[strum(serialize = "binOr")]
    BinOr,
}

impl Opcode {
    /// Canonical spelling, as written by `Display`.
    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Whether `count` arguments is a legal form for this opcode.
    #[must_use]
    pub fn accepts_arg_count(self, count: usize) -> bool {
        match self {
            Self::Push
            | Self::Jz
            | Self::Jmp
            | Self::Call
            | Self::Return
            | Self::Array
            | Self::Access
            | Self::Length => count == 1,
            Self::Pop => count <= 2,
            _ => count == 0,
        }
    }

    /// Human-readable form of the accepted argument counts, for error messages.
    #[must_use]
    pub fn expected_args(self) -> &'static str {
        match self {
            Self::Pop => "0, 1 or 2 arguments",
            _ if self.accepts_arg_count(1) => "exactly 1 argument",
            _ => "no arguments",
        }
    }

    /// The integer operator this opcode applies, for the binary arithmetic, comparison
    /// and logical opcodes.
    #[must_use]
    pub fn binary_op(self) -> Option<BinaryOp> {
        let op = match self {
            Self::Add => BinaryOp::Add,
            Self::Sub => BinaryOp::Sub,
            Self::Mul => BinaryOp::Mul,
            Self::Div => BinaryOp::Div,
            Self::Mod => BinaryOp::Mod,
            Self::CompLt => BinaryOp::Lt,
            Self::CompGt => BinaryOp::Gt,
            Self::CompGe => BinaryOp::Ge,
            Self::CompLe => BinaryOp::Le,
            Self::CompNe => BinaryOp::Ne,
            Self::CompEq => BinaryOp::Eq,
            Self::BinAnd => BinaryOp::And,
            Self::BinOr => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }
}

impl From<BinaryOp> for Opcode {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => Self::Add,
            BinaryOp::Sub => Self::Sub,
            BinaryOp::Mul => Self::Mul,
            BinaryOp::Div => Self::Div,
            BinaryOp::Mod => Self::Mod,
            BinaryOp::Lt => Self::CompLt,
            BinaryOp::Gt => Self::CompGt,
            BinaryOp::Ge => Self::CompGe,
            BinaryOp::Le => Self::CompLe,
            BinaryOp::Ne => Self::CompNe,
            BinaryOp::Eq => Self::CompEq,
            BinaryOp::And => Self::BinAnd,
            BinaryOp::Or => Self::BinOr,
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!("PUSH".parse::<Opcode>(), Ok(Opcode::Push));
        assert_eq!("complt".parse::<Opcode>(), Ok(Opcode::CompLt));
        assert_eq!("BinOr".parse::<Opcode>(), Ok(Opcode::BinOr));
        assert!("frobnicate".parse::<Opcode>().is_err());
    }

    #[test]
    fn display_round_trips_for_every_opcode() {
        for opcode in Opcode::iter() {
            assert_eq!(opcode.to_string().parse::<Opcode>(), Ok(opcode), "{opcode:?}");
        }
        assert_eq!(Opcode::CompGe.to_string(), "compGE");
    }

    #[test]
    fn binary_ops_map_both_ways() {
        for opcode in Opcode::iter() {
            if let Some(op) = opcode.binary_op() {
                assert_eq!(Opcode::from(op), opcode);
            }
        }
        assert_eq!(Opcode::Neg.binary_op(), None);
    }

    #[test]
    fn arity_table() {
        assert!(Opcode::Pop.accepts_arg_count(0));
        assert!(Opcode::Pop.accepts_arg_count(2));
        assert!(!Opcode::Pop.accepts_arg_count(3));
        assert!(Opcode::Return.accepts_arg_count(1));
        assert!(!Opcode::Return.accepts_arg_count(0));
        assert!(!Opcode::Add.accepts_arg_count(1));
    }
}
