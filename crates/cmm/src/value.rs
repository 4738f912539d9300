//! Runtime values stored in the heap arena and the integer operators the VM applies to them.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::{
    error::{ErrorKind, RunError, RunResult},
    heap::HeapId,
};

/// A heap-resident runtime value.
///
/// Integers are immutable once allocated: every operator result is a fresh allocation.
/// Arrays hold handles, so elements can alias (a fresh array shares one zero integer
/// across all slots until they are overwritten).
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
pub(crate) enum Value {
    Int(BigInt),
    Array(Vec<HeapId>),
}

impl Value {
    /// Variant name used in `HeapStats::objects_by_type` and error messages.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.into()
    }

    /// Returns the integer payload or a `TypeError` naming the offending operation.
    pub fn as_int(&self, op: &str) -> RunResult<&BigInt> {
        match self {
            Self::Int(int) => Ok(int),
            Self::Array(_) => Err(RunError::new(
                ErrorKind::TypeError,
                format!("'{op}' expects an integer operand, got an array"),
            )),
        }
    }

    pub fn as_array(&self, op: &str) -> RunResult<&Vec<HeapId>> {
        match self {
            Self::Array(items) => Ok(items),
            Self::Int(_) => Err(RunError::new(
                ErrorKind::TypeError,
                format!("'{op}' expects an array, got an integer"),
            )),
        }
    }

    pub fn as_array_mut(&mut self, op: &str) -> RunResult<&mut Vec<HeapId>> {
        match self {
            Self::Array(items) => Ok(items),
            Self::Int(_) => Err(RunError::new(
                ErrorKind::TypeError,
                format!("'{op}' expects an array, got an integer"),
            )),
        }
    }

    /// Child handles the collector must trace through.
    pub fn children(&self) -> &[HeapId] {
        match self {
            Self::Int(_) => &[],
            Self::Array(items) => items,
        }
    }
}

/// A binary integer operator, shared by the AST, the VM and the constant folder.
///
/// Comparisons and logical operators yield `1` for true and `0` for false.
/// Division and modulo truncate toward zero, so the remainder takes the sign of the dividend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
}

impl BinaryOp {
    /// Relational and equality operators.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Lt | Self::Gt | Self::Ge | Self::Le | Self::Ne | Self::Eq)
    }

    /// Applies the operator to two integers.
    ///
    /// The only failure is division or modulo by zero.
    pub fn apply(self, lhs: &BigInt, rhs: &BigInt) -> RunResult<BigInt> {
        let result = match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div | Self::Mod => {
                if rhs.is_zero() {
                    let what = if self == Self::Div { "division" } else { "modulo" };
                    return Err(RunError::new(ErrorKind::ZeroDivisionError, format!("integer {what} by zero")));
                }
                let (quotient, remainder) = lhs.div_rem(rhs);
                if self == Self::Div { quotient } else { remainder }
            }
            Self::Lt => truth(lhs < rhs),
            Self::Gt => truth(lhs > rhs),
            Self::Ge => truth(lhs >= rhs),
            Self::Le => truth(lhs <= rhs),
            Self::Ne => truth(lhs != rhs),
            Self::Eq => truth(lhs == rhs),
            Self::And => truth(!lhs.is_zero() && !rhs.is_zero()),
            Self::Or => truth(!lhs.is_zero() || !rhs.is_zero()),
        };
        Ok(result)
    }
}

#[inline]
fn truth(flag: bool) -> BigInt {
    if flag { BigInt::one() } else { BigInt::zero() }
}
