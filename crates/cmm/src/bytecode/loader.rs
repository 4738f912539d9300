//! Parses the persisted text format back into a [`Bytecode`].
//!
//! One instruction or label per line. A trimmed line ending in `:` defines a label at
//! the current instruction count; anything else is whitespace-delimited, opcode first.

use std::fmt;

use num_bigint::BigInt;

use super::{
    code::{Bytecode, ENTRY_LABEL, Instruction, LabelTable},
    op::Opcode,
};

/// A structural error in bytecode text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    /// 1-based line number, `None` for whole-program errors such as a missing entry label.
    pub line: Option<usize>,
    pub kind: LoadErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadErrorKind {
    UnknownOpcode(String),
    /// Wrong number of arguments for the opcode.
    Arity { opcode: Opcode, found: usize },
    /// An argument with the right count but the wrong shape, e.g. `return -1`.
    BadArgument { opcode: Opcode, arg: String },
    MalformedLabel(String),
    DuplicateLabel(String),
    MissingEntry,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {line}: ")?;
        }
        match &self.kind {
            LoadErrorKind::UnknownOpcode(name) => write!(f, "unknown instruction '{name}'"),
            LoadErrorKind::Arity { opcode, found } => {
                write!(f, "'{opcode}' takes {} but got {found}", opcode.expected_args())
            }
            LoadErrorKind::BadArgument { opcode, arg } => write!(f, "invalid argument '{arg}' for '{opcode}'"),
            LoadErrorKind::MalformedLabel(text) => write!(f, "malformed label '{text}'"),
            LoadErrorKind::DuplicateLabel(name) => write!(f, "label '{name}' is defined more than once"),
            LoadErrorKind::MissingEntry => write!(f, "entry label '{ENTRY_LABEL}' is not defined"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Loads bytecode text, requiring a `main` entry label.
pub fn load(text: &str) -> Result<Bytecode, LoadError> {
    let mut instructions = Vec::new();
    let mut labels = LabelTable::new();

    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let error = |kind| LoadError {
            line: Some(number + 1),
            kind,
        };

        if let Some(name) = line.strip_suffix(':') {
            let name = name.trim_end();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(error(LoadErrorKind::MalformedLabel(line.to_owned())));
            }
            if labels.define(name, instructions.len()).is_some() {
                return Err(error(LoadErrorKind::DuplicateLabel(name.to_owned())));
            }
            continue;
        }

        instructions.push(parse_instruction(line).map_err(error)?);
    }

    if !labels.contains(ENTRY_LABEL) {
        return Err(LoadError {
            line: None,
            kind: LoadErrorKind::MissingEntry,
        });
    }
    Ok(Bytecode::new(instructions, labels))
}

/// Parses a single non-label line.
pub(crate) fn parse_instruction(line: &str) -> Result<Instruction, LoadErrorKind> {
    let mut tokens = line.split_whitespace();
    // callers never pass a blank line
    let name = tokens.next().unwrap_or_default();
    let opcode: Opcode = name
        .parse()
        .map_err(|_| LoadErrorKind::UnknownOpcode(name.to_owned()))?;
    let instruction = Instruction::new(opcode, tokens);
    validate(&instruction)?;
    Ok(instruction)
}

/// Checks argument count and shape for one instruction.
pub(crate) fn validate(instruction: &Instruction) -> Result<(), LoadErrorKind> {
    let opcode = instruction.opcode();
    let args = instruction.args();
    if !opcode.accepts_arg_count(args.len()) {
        return Err(LoadErrorKind::Arity {
            opcode,
            found: args.len(),
        });
    }
    let bad = |arg: &str| LoadErrorKind::BadArgument {
        opcode,
        arg: arg.to_owned(),
    };
    match (opcode, args) {
        (Opcode::Return, [count]) if count.parse::<usize>().is_err() => Err(bad(count)),
        (Opcode::Pop, [marker, _]) if marker != "arr" => Err(bad(marker)),
        (Opcode::Push, [arg]) if !is_int_literal(arg) && !is_identifier(arg) => Err(bad(arg)),
        (Opcode::Pop | Opcode::Array | Opcode::Access | Opcode::Length, [.., name]) if !is_identifier(name) => {
            Err(bad(name))
        }
        _ => Ok(()),
    }
}

/// Parses `arg` as an integer literal (optionally signed decimal).
pub(crate) fn int_literal(arg: &str) -> Option<BigInt> {
    if is_int_literal(arg) { arg.parse().ok() } else { None }
}

fn is_int_literal(arg: &str) -> bool {
    let digits = arg.strip_prefix('-').unwrap_or(arg);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    bytes
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn labels_index_the_next_instruction() {
        let code = load("main:\n  push 1\n\nloop:\n  print\nend:\n").unwrap();
        assert_eq!(code.len(), 2);
        assert_eq!(code.labels().get("main"), Some(0));
        assert_eq!(code.labels().get("loop"), Some(1));
        assert_eq!(code.labels().get("end"), Some(2), "trailing label points one past the end");
    }

    #[test]
    fn opcodes_are_case_insensitive_and_comments_skipped() {
        let code = load("# header\nmain:\n// note\n\tPUSH 3\n\tCompLt\n").unwrap();
        assert_eq!(code.instructions()[0], Instruction::unary(Opcode::Push, "3"));
        assert_eq!(code.instructions()[1], Instruction::bare(Opcode::CompLt));
    }

    #[test]
    fn missing_entry_is_an_error() {
        let err = load("start:\n push 1\n").unwrap_err();
        assert_eq!(err.kind, LoadErrorKind::MissingEntry);
        assert_eq!(err.line, None);
    }

    #[test]
    fn errors_carry_the_line_number() {
        let err = load("main:\n push 1\n frob 2\n").unwrap_err();
        assert_eq!(err.line, Some(3));
        assert_eq!(err.kind, LoadErrorKind::UnknownOpcode("frob".to_owned()));
        assert_eq!(err.to_string(), "line 3: unknown instruction 'frob'");
    }

    #[test]
    fn arity_is_checked() {
        let err = load("main:\n add 1\n").unwrap_err();
        assert_eq!(
            err.kind,
            LoadErrorKind::Arity {
                opcode: Opcode::Add,
                found: 1
            }
        );
        assert!(load("main:\n push\n").is_err());
        assert!(load("main:\n pop a b c\n").is_err());
        assert!(load("main:\n return\n").is_err());
    }

    #[test]
    fn argument_shapes_are_checked() {
        assert!(matches!(
            load("main:\n return -1\n").unwrap_err().kind,
            LoadErrorKind::BadArgument { opcode: Opcode::Return, .. }
        ));
        assert!(matches!(
            load("main:\n pop into x\n").unwrap_err().kind,
            LoadErrorKind::BadArgument { opcode: Opcode::Pop, .. }
        ));
        assert!(load("main:\n push -12\n pop arr xs\n return 0\n").is_ok());
    }

    #[test]
    fn duplicate_and_malformed_labels() {
        let err = load("main:\nmain:\n").unwrap_err();
        assert_eq!(err.kind, LoadErrorKind::DuplicateLabel("main".to_owned()));
        assert_eq!(err.line, Some(2));
        let err = load("main:\nbad label:\n").unwrap_err();
        assert!(matches!(err.kind, LoadErrorKind::MalformedLabel(_)));
        assert!(load(":\n").is_err());
    }

    #[test]
    fn rendering_loads_back_to_the_same_program() {
        let text = "main:\n push 2\n pop x\n.L0:\n push x\n jz .L1\n push x\n print\n jmp .L0\n.L1:\n return 0\n";
        let code = load(text).unwrap();
        assert_eq!(load(&code.to_string()).unwrap(), code);
    }

    #[test]
    fn literal_and_identifier_recognition() {
        assert_eq!(int_literal("-42"), Some(BigInt::from(-42)));
        assert_eq!(int_literal("x1"), None);
        assert_eq!(int_literal("-"), None);
        assert!(is_identifier("_tmp9"));
        assert!(!is_identifier("9lives"));
        assert!(!is_identifier(".L0"));
    }
}
