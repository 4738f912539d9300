//! Bytecode optimizer pipeline.
//!
//! Each pass is a pure `Bytecode -> Bytecode` transformation; the [`Pipeline`]
//! threads the program through the selected passes in order, once, before execution.
//!
//! - `const_fold` - constant folding over a shadow operand stack
//! - `dead_code` - removal of instructions unreachable from `main`

mod const_fold;
mod dead_code;

use std::fmt;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

pub use const_fold::ConstantFolding;
pub use dead_code::DeadCodeElimination;

use crate::bytecode::{Bytecode, Instruction, LabelTable};

/// A pass failed to make sense of the program's control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizeError {
    /// No `main` label to start reachability from.
    MissingEntry,
    /// A `jz`, `jmp` or `call` at `ip` names a label that does not exist.
    UnresolvedLabel { label: String, ip: usize },
}

impl fmt::Display for OptimizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEntry => f.write_str("cannot optimize: entry label 'main' is not defined"),
            Self::UnresolvedLabel { label, ip } => {
                write!(f, "cannot optimize: instruction {ip} targets undefined label '{label}'")
            }
        }
    }
}

impl std::error::Error for OptimizeError {}

/// A single optimization pass.
pub trait OptimizerPass {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    fn optimize(&self, bytecode: Bytecode) -> Result<Bytecode, OptimizeError>;
}

/// The available passes. Parses from a one-letter flag or the long name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum OptimizerKind {
    #[strum(to_string = "const-folding", serialize = "c")]
    ConstFolding,
    #[strum(to_string = "dead-code", serialize = "d")]
    DeadCode,
}

impl OptimizerKind {
    /// The single-letter flag for this pass.
    #[must_use]
    pub fn letter(self) -> char {
        match self {
            Self::ConstFolding => 'c',
            Self::DeadCode => 'd',
        }
    }

    fn pass(self) -> &'static dyn OptimizerPass {
        match self {
            Self::ConstFolding => &ConstantFolding,
            Self::DeadCode => &DeadCodeElimination,
        }
    }
}

/// An ordered selection of passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    passes: Vec<OptimizerKind>,
}

impl Pipeline {
    #[must_use]
    pub fn new(passes: impl IntoIterator<Item = OptimizerKind>) -> Self {
        Self {
            passes: passes.into_iter().collect(),
        }
    }

    /// Parses a selection such as `"cd"`, `"d"` or `"const-folding,dead-code"`.
    ///
    /// Returns the pipeline and every selector that named no pass; callers warn about
    /// those and carry on.
    #[must_use]
    pub fn parse(selection: &str) -> (Self, Vec<String>) {
        let mut passes = Vec::new();
        let mut unknown = Vec::new();
        for token in selection.split(',').map(str::trim).filter(|token| !token.is_empty()) {
            if let Ok(kind) = token.parse::<OptimizerKind>() {
                passes.push(kind);
                continue;
            }
            if token.contains('-') {
                unknown.push(token.to_owned());
                continue;
            }
            for letter in token.chars() {
                match letter.to_string().parse::<OptimizerKind>() {
                    Ok(kind) => passes.push(kind),
                    Err(_) => unknown.push(letter.to_string()),
                }
            }
        }
        (Self { passes }, unknown)
    }

    #[must_use]
    pub fn passes(&self) -> &[OptimizerKind] {
        &self.passes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Runs every selected pass in order.
    pub fn run(&self, mut bytecode: Bytecode) -> Result<Bytecode, OptimizeError> {
        for kind in &self.passes {
            let pass = kind.pass();
            let before = bytecode.len();
            bytecode = pass.optimize(bytecode)?;
            log::debug!("{}: {before} -> {} instructions", pass.name(), bytecode.len());
        }
        Ok(bytecode)
    }
}

/// Rebuilds a program from the instructions that survived a pass.
///
/// `surviving` pairs each kept (or replacement) instruction with the index of the
/// original instruction it stands for, in increasing order. A label that pointed at
/// original index `k` moves to the number of survivors whose origin is below `k`.
fn rebuild(surviving: Vec<(Instruction, usize)>, labels: &LabelTable) -> Bytecode {
    let origins: Vec<usize> = surviving.iter().map(|(_, origin)| *origin).collect();
    let labels = labels.remap(|k| origins.partition_point(|origin| *origin < k));
    let instructions = surviving.into_iter().map(|(instruction, _)| instruction).collect();
    Bytecode::new(instructions, labels)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::bytecode::load;

    #[test]
    fn parse_letters_and_long_names() {
        let (pipeline, unknown) = Pipeline::parse("cd");
        assert_eq!(pipeline.passes(), [OptimizerKind::ConstFolding, OptimizerKind::DeadCode]);
        assert!(unknown.is_empty());

        let (pipeline, _) = Pipeline::parse("dead-code, const-folding");
        assert_eq!(pipeline.passes(), [OptimizerKind::DeadCode, OptimizerKind::ConstFolding]);
    }

    #[test]
    fn unknown_letters_are_reported_not_fatal() {
        let (pipeline, unknown) = Pipeline::parse("cxz");
        assert_eq!(pipeline.passes(), [OptimizerKind::ConstFolding]);
        assert_eq!(unknown, ["x", "z"]);
        assert!(Pipeline::parse("").0.is_empty());
        assert_eq!(Pipeline::parse("dead-cod").1, ["dead-cod"]);
    }

    #[test]
    fn letters_match_parsing() {
        for kind in OptimizerKind::iter() {
            assert_eq!(kind.letter().to_string().parse::<OptimizerKind>(), Ok(kind));
            assert_eq!(kind.to_string().parse::<OptimizerKind>(), Ok(kind));
        }
    }

    #[test]
    fn rebuild_shifts_labels_past_removed_instructions() {
        let code = load("main:\n push 1\n push 2\nmid:\n add\nend:\n").unwrap();
        let (instructions, labels) = code.into_parts();
        let surviving = vec![(instructions[0].clone(), 0), (instructions[2].clone(), 2)];
        let rebuilt = rebuild(surviving, &labels);
        assert_eq!(rebuilt.labels().get("main"), Some(0));
        assert_eq!(rebuilt.labels().get("mid"), Some(1));
        assert_eq!(rebuilt.labels().get("end"), Some(2));
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let code = load("main:\n push 1\n push 2\n add\n").unwrap();
        assert_eq!(Pipeline::default().run(code.clone()).unwrap(), code);
    }
}
