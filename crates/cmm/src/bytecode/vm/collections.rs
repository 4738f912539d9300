//! Array handlers: `array`, `access`, `pop arr` and `length`.
//!
//! Arrays are always addressed through a variable of the current frame.

use num_bigint::BigInt;

use super::VM;
use crate::{
    bytecode::Opcode,
    error::{ErrorKind, RunError, RunResult},
    heap::HeapId,
    io::PrintWriter,
    resource::ResourceTracker,
    tracer::VmTracer,
    value::Value,
};

impl<T: ResourceTracker, P: PrintWriter, Tr: VmTracer> VM<'_, T, P, Tr> {
    /// Pops a size and binds `name` to a new array of that many zeros.
    pub(super) fn exec_array(&mut self, name: &str) -> RunResult<()> {
        let size_id = self.pop(Opcode::Array)?;
        let size = self.heap.get(size_id)?.as_int(Opcode::Array.name())?;
        let len = usize::try_from(size).map_err(|_| {
            RunError::new(ErrorKind::IndexError, format!("invalid size {size} for array '{name}'"))
        })?;

        self.heap.tracker().check_array_len(len)?;
        let mut items = Vec::new();
        items.try_reserve_exact(len).map_err(|_| {
            RunError::new(ErrorKind::MemoryError, format!("cannot allocate {len} elements for array '{name}'"))
        })?;

        let zero = self.allocate(Value::Int(BigInt::ZERO))?;
        items.resize(len, zero);
        let array = self.allocate(Value::Array(items))?;
        self.frame.bindings.insert(name.to_owned(), array);
        Ok(())
    }

    /// Pops an index and pushes that element of `name`.
    pub(super) fn exec_access(&mut self, name: &str) -> RunResult<()> {
        let index_id = self.pop(Opcode::Access)?;
        let array = self.lookup(name)?;
        let items = self.heap.get(array)?.as_array(Opcode::Access.name())?;
        let index = self.element_index(index_id, items.len(), name)?;
        let element = items[index];
        self.push(element);
        Ok(())
    }

    /// `pop arr <name>`: pops an index, then the value to store there.
    pub(super) fn exec_store_element(&mut self, name: &str) -> RunResult<()> {
        let (value, index_id) = self.pop_pair(Opcode::Pop)?;
        let array = self.lookup(name)?;
        let len = self.heap.get(array)?.as_array(Opcode::Pop.name())?.len();
        let index = self.element_index(index_id, len, name)?;
        self.heap.get_mut(array)?.as_array_mut(Opcode::Pop.name())?[index] = value;
        Ok(())
    }

    pub(super) fn exec_length(&mut self, name: &str) -> RunResult<()> {
        let array = self.lookup(name)?;
        let len = self.heap.get(array)?.as_array(Opcode::Length.name())?.len();
        self.push_int(BigInt::from(len))
    }

    /// Converts the integer at `id` to an in-bounds index for an array of `len` elements.
    fn element_index(&self, id: HeapId, len: usize, name: &str) -> RunResult<usize> {
        let index = self.heap.get(id)?.as_int("index")?;
        usize::try_from(index)
            .ok()
            .filter(|index| *index < len)
            .ok_or_else(|| {
                RunError::new(
                    ErrorKind::IndexError,
                    format!("index {index} out of range for '{name}' of length {len}"),
                )
            })
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
        io::NoPrint,
        object::Object,
        resource::{LimitedTracker, ResourceLimits},
        tracer::NoopTracer,
    };

    #[test]
    fn store_then_length() {
        let text = "main:\n push 5\n array a\n push 9\n push 2\n pop arr a\n push 2\n access a\n print\n \
                    length a\n print\n push a\n print\n";
        assert_eq!(run_text(text).unwrap().0, "9\n5\n[ 0, 0, 9, 0, 0 ]\n");
    }

    #[test]
    fn empty_array() {
        let (out, _) = run_text("main:\n push 0\n array e\n push e\n print\n length e\n print\n").unwrap();
        assert_eq!(out, "[  ]\n0\n");
    }

    #[test]
    fn arrays_nest_through_variables() {
        let text = "main:\n push 2\n array outer\n push 1\n array inner\n push inner\n push 1\n pop arr outer\n \
                    push 1\n access outer\n pop alias\n push 4\n push 0\n pop arr alias\n push outer\n";
        let (_, stack) = run_text(text).unwrap();
        assert_eq!(
            stack,
            vec![Object::Array(vec![
                Object::Int(0.into()),
                Object::Array(vec![Object::Int(4.into())]),
            ])]
        );
    }

    #[test]
    fn out_of_range_indices() {
        let err = run_text("main:\n push 2\n array a\n push 2\n access a\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexError);
        assert!(err.message().contains("index 2 out of range"), "{}", err.message());

        let err = run_text("main:\n push 2\n array a\n push 1\n push -1\n pop arr a\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexError);

        let err = run_text("main:\n push -3\n array a\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexError);
    }

    #[test]
    fn oversized_arrays_are_memory_errors() {
        let err = run_text("main:\n push 100000000000000000\n array a\n return 0\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MemoryError);
        assert_eq!(err.ip(), Some(1));
    }

    #[test]
    fn unbounded_tracker_still_fails_impossible_arrays() {
        let code = load("main:\n push 100000000000000000\n array a\n").unwrap();
        let mut heap = Heap::new(LimitedTracker::new(ResourceLimits::default()));
        let err = VM::new(&code, &mut heap, &mut NoPrint, NoopTracer).run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MemoryError);
    }

    #[test]
    fn integers_are_not_arrays() {
        let err = run_text("main:\n push 1\n pop x\n length x\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeError);
        let err = run_text("main:\n push 0\n access nothing\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NameError);
    }
}
