//! Control flow: `call`, `return`, `jz` and `jmp` targets.
//!
//! Arguments and results travel on the shared operand stack. A callee's prologue
//! pops its parameters; `return n` leaves the top `n` values where they are and
//! hands their ownership to the caller's frame.

use std::mem;

use super::{Frame, Step, VM};
use crate::{
    bytecode::Opcode,
    error::{RunError, RunResult},
    io::PrintWriter,
    resource::ResourceTracker,
    tracer::VmTracer,
};

impl<T: ResourceTracker, P: PrintWriter, Tr: VmTracer> VM<'_, T, P, Tr> {
    pub(super) fn exec_call(&mut self, label: &str) -> RunResult<Step> {
        let target = self.resolve(label)?;
        self.heap.tracker().check_recursion_depth(self.call_depth())?;

        let caller = mem::replace(&mut self.frame, Frame::new(self.ip + 1));
        self.callers.push(caller);
        self.tracer.on_call(label, self.call_depth());
        Ok(Step::Jump(target))
    }

    /// Returning from the outermost frame ends the program, whatever `n` says.
    pub(super) fn exec_return(&mut self, count: &str) -> RunResult<Step> {
        let count: usize = count
            .parse()
            .map_err(|_| RunError::invalid_instruction(format!("'return' count must be non-negative, got '{count}'")))?;
        let Some(caller) = self.callers.pop() else {
            return Ok(Step::Halt);
        };
        let available = self.stack.len();
        if available < count {
            return Err(RunError::stack_underflow(Opcode::Return, count, available));
        }

        let callee = mem::replace(&mut self.frame, caller);
        self.frame
            .owned
            .extend_from_slice(&self.stack[available - count..]);
        self.tracer.on_return(self.call_depth());
        Ok(Step::Jump(callee.return_address))
    }

    pub(super) fn exec_jz(&mut self, label: &str) -> RunResult<Step> {
        let target = self.resolve(label)?;
        let condition = self.pop(Opcode::Jz)?;
        if self.is_zero(condition, Opcode::Jz)? {
            Ok(Step::Jump(target))
        } else {
            Ok(Step::Next)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::super::run_text;
    use crate::{
        bytecode::{VM, load},
        error::ErrorKind,
        heap::Heap,
        io::{CollectStringPrint, NoPrint},
        object::Object,
        resource::{LimitedTracker, ResourceLimits},
        tracer::{NoopTracer, RecordingTracer, TraceEvent},
    };

    #[test]
    fn arguments_arrive_in_declaration_order() {
        // f(a, b) called as f(10, 3): caller pushes 3 then 10, callee pops a then b
        let text = "f:\n pop a\n pop b\n push a\n print\n push b\n print\n push a\n push b\n sub\n return 1\n\
                    main:\n push 3\n push 10\n call f\n print\n return 0\n";
        assert_eq!(run_text(text).unwrap().0, "10\n3\n7\n");
    }

    #[test]
    fn return_resumes_after_the_call_site() {
        let text = "main:\n call f\n push 2\n print\n return 0\nf:\n push 1\n print\n return 0\n";
        assert_eq!(run_text(text).unwrap().0, "1\n2\n");
    }

    #[test]
    fn return_leaves_results_on_the_stack() {
        let text = "pair:\n push 4\n push 5\n return 2\nmain:\n push 1\n call pair\n return 0\n";
        let (_, stack) = run_text(text).unwrap();
        assert_eq!(stack, vec![Object::Int(1.into()), Object::Int(4.into()), Object::Int(5.into())]);
    }

    #[test]
    fn returned_values_survive_collection() {
        // collect after every stack op while the result sits on the stack
        let text = "make:\n push 3\n array xs\n push 8\n push 0\n pop arr xs\n push xs\n return 1\n\
                    main:\n call make\n pop r\n push 1\n pop junk\n push r\n print\n return 0\n";
        let code = load(text).unwrap();
        let mut heap = Heap::new(LimitedTracker::new(ResourceLimits::new().gc_interval(1)));
        let mut print = CollectStringPrint::new();
        let mut vm = VM::new(&code, &mut heap, &mut print, NoopTracer);
        vm.run().unwrap();
        drop(vm);
        assert_eq!(print.output(), "[ 8, 0, 0 ]\n");
    }

    #[test]
    fn return_needs_enough_values() {
        let err = run_text("main:\n call f\n return 0\nf:\n push 1\n return 2\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StackUnderflow);
        assert_eq!(err.ip(), Some(3));
    }

    #[test]
    fn outermost_return_halts_without_values() {
        let (out, stack) = run_text("main:\n return 1\n push 1\n print\n").unwrap();
        assert_eq!(out, "");
        assert_eq!(stack, vec![]);
    }

    #[test]
    fn jz_branches_only_on_zero() {
        let text = "main:\n push 0\n jz skip\n push 1\n print\nskip:\n push 5\n jz done\n push 2\n print\ndone:\n";
        assert_eq!(run_text(text).unwrap().0, "2\n");
    }

    #[test]
    fn unresolved_targets_fail_at_runtime() {
        let err = run_text("main:\n call nowhere\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedLabel);
        let err = run_text("main:\n jmp nowhere\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedLabel);
    }

    #[test]
    fn jump_to_trailing_label_halts() {
        assert_eq!(run_text("main:\n jmp end\n push 1\n print\nend:\n").unwrap().0, "");
    }

    #[test]
    fn runaway_recursion_is_limited() {
        let code = load("main:\n call main\n").unwrap();
        let mut heap = Heap::new(LimitedTracker::new(ResourceLimits::new().max_recursion_depth(Some(50))));
        let mut tracer = RecordingTracer::new();
        let err = VM::new(&code, &mut heap, &mut NoPrint, &mut tracer)
            .run()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RecursionError);
        let deepest = tracer
            .events()
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Call { depth, .. } => Some(*depth),
                _ => None,
            })
            .max();
        assert_eq!(deepest, Some(50));
    }
}
