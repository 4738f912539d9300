//! Error types shared across the toolchain.
//!
//! Each stage owns its own error type (`ParseError`, `CompileError`, `LoadError`,
//! `OptimizeError`, `RunError`). [`Error`] wraps all of them so the top-level
//! entry points in `run.rs` can use `?` across stage boundaries.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    bytecode::{CompileError, LoadError},
    optimizer::OptimizeError,
    parse::ParseError,
    resource::ResourceError,
};

/// Category of a fatal runtime error raised by the VM.
///
/// The string form (via strum) is what fixtures match on with `// expect-error:`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
pub enum ErrorKind {
    /// An instruction needed more operands than the stack held.
    StackUnderflow,
    /// An operand had the wrong runtime type (e.g. `add` on an array).
    TypeError,
    /// A `jz`, `jmp` or `call` named a label that does not exist.
    UnresolvedLabel,
    ZeroDivisionError,
    /// Array access or store outside `0..len`.
    IndexError,
    /// A name was read before it was bound in the current frame.
    NameError,
    /// Malformed instruction, e.g. wrong argument count or a bad `return` count.
    InvalidInstruction,
    /// A heap handle referred to a freed slot.
    DanglingHandle,
    RecursionError,
    /// The allocation limit was exceeded.
    MemoryError,
}

/// A fatal runtime error. Execution stops as soon as one is raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    kind: ErrorKind,
    message: String,
    /// Index of the instruction that raised the error, filled in by the dispatch loop.
    ip: Option<usize>,
}

/// Result alias used by all VM handlers.
pub type RunResult<T> = Result<T, RunError>;

impl RunError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            ip: None,
        }
    }

    pub(crate) fn stack_underflow(opcode: impl fmt::Display, needed: usize, available: usize) -> Self {
        Self::new(
            ErrorKind::StackUnderflow,
            format!("'{opcode}' needs {needed} operand(s) but the stack holds {available}"),
        )
    }

    pub(crate) fn name_error(name: &str) -> Self {
        Self::new(ErrorKind::NameError, format!("name '{name}' is not defined"))
    }

    pub(crate) fn unresolved_label(label: &str) -> Self {
        Self::new(ErrorKind::UnresolvedLabel, format!("label '{label}' is not defined"))
    }

    pub(crate) fn invalid_instruction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInstruction, message)
    }

    /// Attaches the instruction pointer unless an inner handler already did.
    #[must_use]
    pub(crate) fn at(mut self, ip: usize) -> Self {
        if self.ip.is_none() {
            self.ip = Some(ip);
        }
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Instruction index the error was raised at, if known.
    #[must_use]
    pub fn ip(&self) -> Option<usize> {
        self.ip
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(ip) = self.ip {
            write!(f, " (at instruction {ip})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RunError {}

impl From<ResourceError> for RunError {
    fn from(err: ResourceError) -> Self {
        let kind = match err {
            ResourceError::Allocation { .. } | ResourceError::ArrayLength { .. } => ErrorKind::MemoryError,
            ResourceError::Recursion { .. } => ErrorKind::RecursionError,
        };
        Self::new(kind, err.to_string())
    }
}

/// Any error the toolchain can produce, from parsing through execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Parse(ParseError),
    Compile(CompileError),
    Load(LoadError),
    Optimize(OptimizeError),
    Run(RunError),
    /// Failure to (de)serialize a dumped `Runner`.
    Serialization(String),
}

impl Error {
    /// Short name of the error category, e.g. `"LoadError"` or `"ZeroDivisionError"`.
    ///
    /// Runtime errors report their [`ErrorKind`] rather than a generic name.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Parse(_) => "ParseError",
            Self::Compile(_) => "CompileError",
            Self::Load(_) => "LoadError",
            Self::Optimize(_) => "OptimizeError",
            Self::Run(err) => err.kind().into(),
            Self::Serialization(_) => "SerializationError",
        }
    }

    /// The runtime error, if this is one.
    #[must_use]
    pub fn as_run_error(&self) -> Option<&RunError> {
        match self {
            Self::Run(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
            Self::Compile(err) => write!(f, "{err}"),
            Self::Load(err) => write!(f, "{err}"),
            Self::Optimize(err) => write!(f, "{err}"),
            Self::Run(err) => write!(f, "{err}"),
            Self::Serialization(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        Self::Compile(err)
    }
}

impl From<LoadError> for Error {
    fn from(err: LoadError) -> Self {
        Self::Load(err)
    }
}

impl From<OptimizeError> for Error {
    fn from(err: OptimizeError) -> Self {
        Self::Optimize(err)
    }
}

impl From<RunError> for Error {
    fn from(err: RunError) -> Self {
        Self::Run(err)
    }
}

impl From<postcard::Error> for Error {
    fn from(err: postcard::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_error_display_includes_ip_once_attached() {
        let err = RunError::new(ErrorKind::IndexError, "index 7 out of range for array of length 5");
        assert_eq!(err.to_string(), "IndexError: index 7 out of range for array of length 5");
        let err = err.at(12).at(40);
        assert_eq!(err.ip(), Some(12), "first attached ip must win");
        assert_eq!(
            err.to_string(),
            "IndexError: index 7 out of range for array of length 5 (at instruction 12)"
        );
    }

    #[test]
    fn kind_name_uses_runtime_kind() {
        let err: Error = RunError::new(ErrorKind::ZeroDivisionError, "division by zero").into();
        assert_eq!(err.kind_name(), "ZeroDivisionError");
        assert_eq!("ZeroDivisionError".parse::<ErrorKind>(), Ok(ErrorKind::ZeroDivisionError));
    }

    #[test]
    fn resource_errors_map_to_kinds() {
        let err: RunError = ResourceError::Recursion { limit: 10, depth: 11 }.into();
        assert_eq!(err.kind(), ErrorKind::RecursionError);
        let err: RunError = ResourceError::Allocation { limit: 3, count: 4 }.into();
        assert_eq!(err.kind(), ErrorKind::MemoryError);
    }
}
