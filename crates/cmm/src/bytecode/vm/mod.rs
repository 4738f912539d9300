//! Bytecode virtual machine.
//!
//! One operand stack shared by every frame, a current [`Frame`] plus the suspended
//! callers beneath it, and an instruction pointer into a loaded [`Bytecode`].
//! Handlers live in the submodules, grouped by opcode family.

mod binary;
mod call;
mod collections;
mod compare;

use std::{borrow::Cow, collections::BTreeMap};

use ahash::AHashMap;
use num_bigint::BigInt;

use super::{Bytecode, ENTRY_LABEL, Instruction, Opcode, loader::int_literal};
use crate::{
    error::{RunError, RunResult},
    heap::{Heap, HeapId},
    io::PrintWriter,
    object::{self, Object},
    resource::ResourceTracker,
    tracer::{NoopTracer, VmTracer},
    value::Value,
};

/// Activation record for one function invocation.
#[derive(Debug, Default)]
pub(super) struct Frame {
    /// Variable name to current value.
    bindings: AHashMap<String, HeapId>,
    /// Objects this frame allocated or received from a returning callee.
    ///
    /// Pruned to the marked set on every collection.
    owned: Vec<HeapId>,
    /// Instruction index to resume at when this frame returns.
    return_address: usize,
}

impl Frame {
    fn new(return_address: usize) -> Self {
        Self {
            return_address,
            ..Self::default()
        }
    }
}

/// What the dispatch loop does after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Step {
    /// Fall through to the next instruction.
    Next,
    /// Continue at this instruction index.
    Jump(usize),
    /// The outermost frame returned.
    Halt,
}

/// The bytecode virtual machine.
///
/// Runs from the `main` label with a single frame until that frame returns or the
/// instruction pointer moves past the last instruction.
#[derive(Debug)]
pub struct VM<'a, T: ResourceTracker, P: PrintWriter, Tr: VmTracer = NoopTracer> {
    code: &'a Bytecode,
    heap: &'a mut Heap<T>,
    print_writer: &'a mut P,
    tracer: Tr,

    /// Operand stack, shared by all frames.
    stack: Vec<HeapId>,
    /// Frame of the function currently executing.
    frame: Frame,
    /// Suspended callers, outermost first.
    callers: Vec<Frame>,
    ip: usize,
}

impl<'a, T: ResourceTracker, P: PrintWriter, Tr: VmTracer> VM<'a, T, P, Tr> {
    pub fn new(code: &'a Bytecode, heap: &'a mut Heap<T>, print_writer: &'a mut P, tracer: Tr) -> Self {
        Self {
            code,
            heap,
            print_writer,
            tracer,
            stack: Vec::new(),
            frame: Frame::new(code.len()),
            callers: Vec::new(),
            ip: 0,
        }
    }

    /// Runs the program from its entry label to completion.
    ///
    /// The first error aborts the run; its `ip` names the failing instruction.
    pub fn run(&mut self) -> RunResult<()> {
        self.ip = self
            .code
            .entry()
            .ok_or_else(|| RunError::unresolved_label(ENTRY_LABEL))?;

        let code = self.code;
        while let Some(instruction) = code.instructions().get(self.ip) {
            let ip = self.ip;
            let opcode = instruction.opcode();
            self.tracer
                .on_instruction(ip, opcode, self.stack.len(), self.call_depth());

            let step = self.execute(instruction).map_err(|err| err.at(ip))?;

            if matches!(opcode, Opcode::Push | Opcode::Pop | Opcode::Return) {
                self.heap.record_stack_op();
            }
            // collect only between instructions, once the result is rooted
            if self.heap.should_gc() {
                self.collect_garbage();
            }

            match step {
                Step::Next => self.ip += 1,
                Step::Jump(target) => self.ip = target,
                Step::Halt => break,
            }
        }
        Ok(())
    }

    fn execute(&mut self, instruction: &Instruction) -> RunResult<Step> {
        let opcode = instruction.opcode();
        match (opcode, instruction.args()) {
            (Opcode::Push, [arg]) => self.exec_push(arg)?,
            (Opcode::Pop, []) => {
                self.pop(opcode)?;
            }
            (Opcode::Pop, [name]) => {
                let id = self.pop(opcode)?;
                self.frame.bindings.insert(name.clone(), id);
            }
            (Opcode::Pop, [_, name]) => self.exec_store_element(name)?,
            (Opcode::Print, []) => self.exec_print()?,
            (Opcode::Neg, []) => self.exec_neg()?,
            (Opcode::Jz, [label]) => return self.exec_jz(label),
            (Opcode::Jmp, [label]) => return self.resolve(label).map(Step::Jump),
            (Opcode::Call, [label]) => return self.exec_call(label),
            (Opcode::Return, [count]) => return self.exec_return(count),
            (Opcode::Array, [name]) => self.exec_array(name)?,
            (Opcode::Access, [name]) => self.exec_access(name)?,
            (Opcode::Length, [name]) => self.exec_length(name)?,
            (_, []) => match opcode.binary_op() {
                Some(op) if op.is_comparison() => self.exec_compare(opcode, op)?,
                Some(op) => self.exec_binary(opcode, op)?,
                None => return Err(bad_arity(instruction)),
            },
            _ => return Err(bad_arity(instruction)),
        }
        Ok(Step::Next)
    }

    fn exec_push(&mut self, arg: &str) -> RunResult<()> {
        let id = match int_literal(arg) {
            Some(value) => self.allocate(Value::Int(value))?,
            None => self.lookup(arg)?,
        };
        self.push(id);
        Ok(())
    }

    fn exec_print(&mut self) -> RunResult<()> {
        let id = self.pop(Opcode::Print)?;
        let text = object::render(id, self.heap)?;
        self.print_writer.stdout_write(Cow::Owned(text))?;
        self.print_writer.stdout_push('\n')
    }

    // ========================================================================
    // Stack, frame and heap helpers shared by the handler modules
    // ========================================================================

    #[inline]
    pub(super) fn push(&mut self, id: HeapId) {
        self.stack.push(id);
    }

    #[inline]
    pub(super) fn pop(&mut self, opcode: Opcode) -> RunResult<HeapId> {
        self.stack.pop().ok_or_else(|| RunError::stack_underflow(opcode, 1, 0))
    }

    /// Pops the right operand, then the left. Returns `(lhs, rhs)`.
    pub(super) fn pop_pair(&mut self, opcode: Opcode) -> RunResult<(HeapId, HeapId)> {
        let available = self.stack.len();
        match (self.stack.pop(), self.stack.pop()) {
            (Some(rhs), Some(lhs)) => Ok((lhs, rhs)),
            _ => Err(RunError::stack_underflow(opcode, 2, available)),
        }
    }

    /// Allocates a value owned by the current frame.
    pub(super) fn allocate(&mut self, value: Value) -> RunResult<HeapId> {
        let id = self.heap.allocate(value)?;
        self.frame.owned.push(id);
        Ok(id)
    }

    /// Allocates an integer and pushes it.
    pub(super) fn push_int(&mut self, value: BigInt) -> RunResult<()> {
        let id = self.allocate(Value::Int(value))?;
        self.push(id);
        Ok(())
    }

    /// Current binding of `name` in the executing frame.
    pub(super) fn lookup(&self, name: &str) -> RunResult<HeapId> {
        self.frame
            .bindings
            .get(name)
            .copied()
            .ok_or_else(|| RunError::name_error(name))
    }

    pub(super) fn resolve(&self, label: &str) -> RunResult<usize> {
        self.code
            .labels()
            .get(label)
            .ok_or_else(|| RunError::unresolved_label(label))
    }

    /// Number of live frames, including the current one.
    #[inline]
    pub(super) fn call_depth(&self) -> usize {
        self.callers.len() + 1
    }

    fn collect_garbage(&mut self) {
        let bindings = self
            .callers
            .iter()
            .chain(std::iter::once(&self.frame))
            .flat_map(|frame| frame.bindings.values().copied());
        let marks = self.heap.mark(self.stack.iter().copied().chain(bindings));

        for frame in self.callers.iter_mut().chain(std::iter::once(&mut self.frame)) {
            frame.owned.retain(|id| marks.is_marked(*id));
        }
        let freed = self.heap.sweep(&marks);
        let live = self.heap.live_count();
        log::trace!("gc: freed {freed}, {live} live");
        self.tracer.on_gc(freed, live);
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// The operand stack, bottom first, converted to owned objects.
    pub fn stack_objects(&self) -> RunResult<Vec<Object>> {
        self.stack
            .iter()
            .map(|id| Object::from_heap(*id, self.heap))
            .collect()
    }

    /// Bindings of the outermost frame, sorted by name.
    pub fn global_objects(&self) -> RunResult<BTreeMap<String, Object>> {
        let outer = self.callers.first().unwrap_or(&self.frame);
        outer
            .bindings
            .iter()
            .map(|(name, id)| Ok((name.clone(), Object::from_heap(*id, self.heap)?)))
            .collect()
    }
}

/// Runs bytecode text with no limits and returns the printed output and the final stack.
#[cfg(test)]
fn run_text(text: &str) -> RunResult<(String, Vec<Object>)> {
    let code = super::load(text).map_err(|err| RunError::invalid_instruction(err.to_string()))?;
    let mut heap = Heap::new(crate::resource::NoLimitTracker);
    let mut print = crate::io::CollectStringPrint::new();
    let mut vm = VM::new(&code, &mut heap, &mut print, NoopTracer);
    vm.run()?;
    let stack = vm.stack_objects()?;
    Ok((print.into_output(), stack))
}

fn bad_arity(instruction: &Instruction) -> RunError {
    let opcode = instruction.opcode();
    RunError::invalid_instruction(format!(
        "'{opcode}' takes {} but got {}",
        opcode.expected_args(),
        instruction.args().len()
    ))
}
