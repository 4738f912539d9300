//! AST for C-- programs, produced by `parse.rs` and consumed by the code generator.
//!
//! Everything derives `Serialize` so the CLI can dump a program as JSON.

use num_bigint::BigInt;
use serde::{Serialize, Serializer};

use crate::{parse::CodeLoc, value::BinaryOp};

/// A whole source file: a sequence of function declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Program {
    pub functions: Vec<FunctionDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDecl {
    pub name: String,
    /// Formal parameters in declaration order.
    pub params: Vec<String>,
    pub body: Block,
    pub loc: CodeLoc,
}

impl FunctionDecl {
    /// Whether any `return` appears anywhere in the body.
    ///
    /// Such functions always leave exactly one value for their caller.
    #[must_use]
    pub fn yields_value(&self) -> bool {
        self.body.contains_return()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

impl Block {
    fn contains_return(&self) -> bool {
        self.statements.iter().any(Stmt::contains_return)
    }

    /// Whether the last top-level statement is a `return`.
    #[must_use]
    pub fn ends_with_return(&self) -> bool {
        matches!(self.statements.last(), Some(Stmt::Return(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Stmt {
    Print(Expr),
    Return(Expr),
    Assign(Assign),
    /// `array name[size];`
    ArrayInit {
        name: String,
        size: Expr,
    },
    /// A call whose result (if any) is discarded.
    Call(Call),
    While {
        condition: Expr,
        body: Block,
    },
    For {
        init: Assign,
        condition: Expr,
        step: Assign,
        body: Block,
    },
    If {
        condition: Expr,
        then_block: Block,
        /// `else if` chains are represented as an else block holding a single `If`.
        else_block: Option<Block>,
    },
    Block(Block),
}

impl Stmt {
    fn contains_return(&self) -> bool {
        match self {
            Self::Return(_) => true,
            Self::While { body, .. } | Self::For { body, .. } | Self::Block(body) => body.contains_return(),
            Self::If {
                then_block, else_block, ..
            } => then_block.contains_return() || else_block.as_ref().is_some_and(Block::contains_return),
            Self::Print(_) | Self::Assign(_) | Self::ArrayInit { .. } | Self::Call(_) => false,
        }
    }
}

/// `place = value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assign {
    pub target: Place,
    pub value: Expr,
}

/// A variable, optionally indexed: `x`, `xs[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Place {
    pub name: String,
    pub indices: Vec<Expr>,
    pub loc: CodeLoc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expr>,
    pub loc: CodeLoc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Expr {
    Int(#[serde(serialize_with = "serialize_decimal")] BigInt),
    Place(Place),
    Call(Call),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// Writes integer literals as JSON strings so arbitrary precision survives the dump.
fn serialize_decimal<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
