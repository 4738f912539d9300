//! Comparison handlers and the truth test used by `jz`.

use num_traits::Zero;

use super::VM;
use crate::{
    bytecode::Opcode,
    error::RunResult,
    heap::HeapId,
    io::PrintWriter,
    resource::ResourceTracker,
    tracer::VmTracer,
    value::BinaryOp,
};

impl<T: ResourceTracker, P: PrintWriter, Tr: VmTracer> VM<'_, T, P, Tr> {
    /// `compLT`, `compGT`, `compGE`, `compLE`, `compNE`, `compEQ`: push `1` or `0`.
    ///
    /// Only integers compare; there is no identity comparison of arrays.
    pub(super) fn exec_compare(&mut self, opcode: Opcode, op: BinaryOp) -> RunResult<()> {
        let (lhs, rhs) = self.pop_pair(opcode)?;
        let name = opcode.name();
        let lhs = self.heap.get(lhs)?.as_int(name)?;
        let rhs = self.heap.get(rhs)?.as_int(name)?;
        let result = op.apply(lhs, rhs)?;
        self.push_int(result)
    }

    /// Whether `id` holds the zero integer.
    pub(super) fn is_zero(&self, id: HeapId, opcode: Opcode) -> RunResult<bool> {
        Ok(self.heap.get(id)?.as_int(opcode.name())?.is_zero())
    }
}
