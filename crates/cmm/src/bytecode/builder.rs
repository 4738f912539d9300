//! Builder for emitting bytecode during compilation.

use super::{
    code::{Bytecode, Instruction, LabelTable},
    op::Opcode,
};

/// Builder for emitting bytecode during compilation.
///
/// Owns the instruction list, the label table and the synthetic label counter for
/// one generation pass.
///
/// # Usage
///
/// ```ignore
/// let mut builder = CodeBuilder::new();
/// builder.place_label("main");
/// let end = builder.fresh_label();
/// builder.emit_arg(Opcode::Push, "0");
/// builder.emit_arg(Opcode::Jz, &end);
/// builder.place_label(&end);
/// let code = builder.build();
/// ```
#[derive(Debug, Default)]
pub struct CodeBuilder {
    instructions: Vec<Instruction>,
    labels: LabelTable,
    /// Counter for `.L<n>` labels. Identifiers cannot start with `.`, so these never
    /// collide with function names.
    next_label: usize,
}

impl CodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a no-argument instruction.
    pub fn emit(&mut self, opcode: Opcode) {
        self.instructions.push(Instruction::bare(opcode));
    }

    /// Emits a one-argument instruction.
    pub fn emit_arg(&mut self, opcode: Opcode, arg: impl Into<String>) {
        self.instructions.push(Instruction::unary(opcode, arg));
    }

    /// Emits `pop arr <name>`.
    pub fn emit_array_store(&mut self, name: &str) {
        self.instructions.push(Instruction::new(Opcode::Pop, ["arr", name]));
    }

    /// Allocates a new synthetic label name without placing it.
    pub fn fresh_label(&mut self) -> String {
        let label = format!(".L{}", self.next_label);
        self.next_label += 1;
        label
    }

    /// Places `name` at the current position. Returns `false` if it was already defined.
    pub fn place_label(&mut self, name: &str) -> bool {
        self.labels.define(name, self.instructions.len()).is_none()
    }

    #[must_use]
    pub fn build(self) -> Bytecode {
        Bytecode::new(self.instructions, self.labels)
    }
}
