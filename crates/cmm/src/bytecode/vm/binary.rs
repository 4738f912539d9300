//! Arithmetic, logical and negation handlers.
//!
//! Integers are immutable, so every result is a fresh allocation owned by the
//! current frame.

use super::VM;
use crate::{
    bytecode::Opcode,
    error::RunResult,
    io::PrintWriter,
    resource::ResourceTracker,
    tracer::VmTracer,
    value::BinaryOp,
};

impl<T: ResourceTracker, P: PrintWriter, Tr: VmTracer> VM<'_, T, P, Tr> {
    /// `add`, `sub`, `mul`, `div`, `mod`, `binAnd`, `binOr`.
    pub(super) fn exec_binary(&mut self, opcode: Opcode, op: BinaryOp) -> RunResult<()> {
        let (lhs, rhs) = self.pop_pair(opcode)?;
        let name = opcode.name();
        let result = op.apply(self.heap.get(lhs)?.as_int(name)?, self.heap.get(rhs)?.as_int(name)?)?;
        self.push_int(result)
    }

    pub(super) fn exec_neg(&mut self) -> RunResult<()> {
        let id = self.pop(Opcode::Neg)?;
        let negated = -self.heap.get(id)?.as_int(Opcode::Neg.name())?;
        self.push_int(negated)
    }
}
