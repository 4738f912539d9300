//! Constant folding.
//!
//! A single forward pass tracks a shadow of the operand stack. When an operator's
//! operands are both known constants, produced by the two instructions just before it,
//! the three instructions collapse into one `push <result>`.

use num_bigint::BigInt;

use super::{OptimizeError, OptimizerPass, rebuild};
use crate::bytecode::{Bytecode, Instruction, Opcode, loader::int_literal};

/// What the shadow stack knows about one operand slot.
#[derive(Debug, Clone)]
enum Shadow {
    /// A constant pushed by the output instruction at `pos`.
    Const { value: BigInt, pos: usize },
    Unknown,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantFolding;

impl OptimizerPass for ConstantFolding {
    fn name(&self) -> &'static str {
        "const-folding"
    }

    fn optimize(&self, bytecode: Bytecode) -> Result<Bytecode, OptimizeError> {
        let (instructions, labels) = bytecode.into_parts();

        let mut is_target = vec![false; instructions.len() + 1];
        for (_, index) in labels.iter() {
            if let Some(flag) = is_target.get_mut(index) {
                *flag = true;
            }
        }

        let mut out: Vec<(Instruction, usize)> = Vec::with_capacity(instructions.len());
        let mut shadow: Vec<Shadow> = Vec::new();
        let mut folded = 0usize;

        for (index, instruction) in instructions.into_iter().enumerate() {
            // values never flow across a jump target
            if is_target[index] {
                shadow.clear();
            }
            let opcode = instruction.opcode();

            if let Some(op) = opcode.binary_op() {
                let rhs = shadow.pop().unwrap_or(Shadow::Unknown);
                let lhs = shadow.pop().unwrap_or(Shadow::Unknown);
                let len = out.len();
                if let (Shadow::Const { value: a, pos: pa }, Shadow::Const { value: b, pos: pb }) = (&lhs, &rhs)
                    && *pa + 2 == len
                    && *pb + 1 == len
                    && let Ok(value) = op.apply(a, b)
                {
                    out.truncate(len - 2);
                    push_const(&mut out, &mut shadow, value, index);
                    folded += 1;
                    continue;
                }
                out.push((instruction, index));
                shadow.push(Shadow::Unknown);
                continue;
            }

            match opcode {
                Opcode::Push => {
                    let entry = match instruction.arg(0).and_then(int_literal) {
                        Some(value) => Shadow::Const { value, pos: out.len() },
                        None => Shadow::Unknown,
                    };
                    out.push((instruction, index));
                    shadow.push(entry);
                }
                Opcode::Neg => match shadow.pop() {
                    Some(Shadow::Const { value, pos }) if pos + 1 == out.len() => {
                        out.truncate(pos);
                        push_const(&mut out, &mut shadow, -value, index);
                        folded += 1;
                    }
                    _ => {
                        out.push((instruction, index));
                        shadow.push(Shadow::Unknown);
                    }
                },
                Opcode::Jmp | Opcode::Return | Opcode::Call => {
                    out.push((instruction, index));
                    // the next instruction is reached from elsewhere
                    shadow.clear();
                }
                _ => {
                    let (pops, pushes) = stack_effect(&instruction);
                    shadow.truncate(shadow.len().saturating_sub(pops));
                    shadow.extend((0..pushes).map(|_| Shadow::Unknown));
                    out.push((instruction, index));
                }
            }
        }

        log::debug!("const-folding: folded {folded} operation(s)");
        Ok(rebuild(out, &labels))
    }
}

fn push_const(out: &mut Vec<(Instruction, usize)>, shadow: &mut Vec<Shadow>, value: BigInt, origin: usize) {
    shadow.push(Shadow::Const {
        pos: out.len(),
        value: value.clone(),
    });
    out.push((Instruction::unary(Opcode::Push, value.to_string()), origin));
}

/// Operands consumed and results produced by the instructions folding leaves alone.
fn stack_effect(instruction: &Instruction) -> (usize, usize) {
    match (instruction.opcode(), instruction.args().len()) {
        (Opcode::Pop, 2) => (2, 0),
        (Opcode::Pop | Opcode::Print | Opcode::Jz | Opcode::Array, _) => (1, 0),
        (Opcode::Access, _) => (1, 1),
        (Opcode::Length, _) => (0, 1),
        _ => (0, 0),
    }
}
