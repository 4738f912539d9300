//! The shared program representation: an instruction list plus a label table.

use std::fmt::{self, Write as _};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::op::Opcode;

/// Name of the label execution starts at.
pub const ENTRY_LABEL: &str = "main";

/// One bytecode instruction: an opcode plus its string arguments.
///
/// Arguments stay textual: `push 3` and `push x` share one representation and the VM
/// decides at dispatch whether the argument is a literal or a binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    opcode: Opcode,
    args: SmallVec<[String; 2]>,
}

impl Instruction {
    pub fn new<S: Into<String>>(opcode: Opcode, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            opcode,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// An instruction with no arguments.
    #[must_use]
    pub fn bare(opcode: Opcode) -> Self {
        Self {
            opcode,
            args: SmallVec::new(),
        }
    }

    /// An instruction with exactly one argument.
    pub fn unary(opcode: Opcode, arg: impl Into<String>) -> Self {
        let mut args = SmallVec::new();
        args.push(arg.into());
        Self { opcode, args }
    }

    #[inline]
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    #[inline]
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[inline]
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.name())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Mapping from label name to instruction index.
///
/// Function entry points and synthetic control-flow targets share one table.
/// Insertion order is preserved so rendering is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTable(IndexMap<String, usize>);

impl LabelTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines `name` at `index`. Returns the previous index if the label already existed,
    /// in which case the table is left unchanged.
    pub fn define(&mut self, name: impl Into<String>, index: usize) -> Option<usize> {
        match self.0.entry(name.into()) {
            indexmap::map::Entry::Occupied(entry) => Some(*entry.get()),
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(index);
                None
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<usize> {
        self.0.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Labels in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(name, index)| (name.as_str(), *index))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a table with every index passed through `f`, keeping names and order.
    #[must_use]
    pub fn remap(&self, mut f: impl FnMut(usize) -> usize) -> Self {
        Self(self.0.iter().map(|(name, index)| (name.clone(), f(*index))).collect())
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for LabelTable {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, index) in iter {
            table.define(name, index);
        }
        table
    }
}

/// A complete program: instructions plus the labels that index into them.
///
/// Every label indexes `0..=instructions.len()`; an index equal to the length marks
/// a trailing label, and reaching it halts like running off the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bytecode {
    instructions: Vec<Instruction>,
    labels: LabelTable,
}

impl Bytecode {
    #[must_use]
    pub fn new(instructions: Vec<Instruction>, labels: LabelTable) -> Self {
        Self { instructions, labels }
    }

    #[inline]
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    #[inline]
    #[must_use]
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<Instruction>, LabelTable) {
        (self.instructions, self.labels)
    }

    /// Index of the `main` label, if defined.
    #[must_use]
    pub fn entry(&self) -> Option<usize> {
        self.labels.get(ENTRY_LABEL)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Renders the program in the persisted text format.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // infallible: fmt::Write for String never errors
        let _ = write!(out, "{self}");
        out
    }
}

impl fmt::Display for Bytecode {
    /// One label or instruction per line; labels are written flush left right
    /// before the instruction they index, instructions are indented.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut by_index: Vec<Vec<&str>> = vec![Vec::new(); self.instructions.len() + 1];
        for (name, index) in self.labels.iter() {
            if let Some(slot) = by_index.get_mut(index) {
                slot.push(name);
            }
        }
        for (index, names) in by_index.iter().enumerate() {
            for name in names {
                writeln!(f, "{name}:")?;
            }
            if let Some(instruction) = self.instructions.get(index) {
                writeln!(f, "    {instruction}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_redefinition_is_rejected() {
        let mut labels = LabelTable::new();
        assert_eq!(labels.define("main", 0), None);
        assert_eq!(labels.define("main", 4), Some(0));
        assert_eq!(labels.get("main"), Some(0));
    }

    #[test]
    fn display_places_labels_before_their_instruction() {
        let code = Bytecode::new(
            vec![
                Instruction::unary(Opcode::Push, "1"),
                Instruction::bare(Opcode::Print),
            ],
            [("main", 0), (".L0", 2)].into_iter().collect(),
        );
        assert_eq!(code.to_string(), "main:\n    push 1\n    print\n.L0:\n");
    }

    #[test]
    fn remap_keeps_order() {
        let labels: LabelTable = [("b", 3), ("a", 1)].into_iter().collect();
        let shifted = labels.remap(|index| index + 10);
        assert_eq!(shifted.iter().collect::<Vec<_>>(), vec![("b", 13), ("a", 11)]);
    }
}
