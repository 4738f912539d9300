use std::fmt;

use ahash::AHashSet;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::{
    error::RunResult,
    heap::{Heap, HeapId},
    resource::{MAX_DATA_RECURSION_DEPTH, ResourceTracker},
    value::Value,
};

/// How a cut-off array renders.
const ELIDED: &str = "[...]";

/// A C-- value detached from the VM heap.
///
/// Returned by [`crate::run`] for the final operand stack and global bindings.
/// Unless an array was cut off, its `Display` is exactly what the `print` instruction writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Object {
    Int(BigInt),
    Array(Vec<Object>),
    /// An array reached again while it was still being converted, e.g. after `a[0] = a`.
    Cycle,
    /// An array nested deeper than [`MAX_DATA_RECURSION_DEPTH`].
    Truncated,
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Array(items) => {
                f.write_str("[ ")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(" ]")
            }
            Self::Cycle | Self::Truncated => f.write_str(ELIDED),
        }
    }
}

impl Object {
    /// Copies the value behind `id` out of the heap.
    pub(crate) fn from_heap(id: HeapId, heap: &Heap<impl ResourceTracker>) -> RunResult<Self> {
        let mut visiting = AHashSet::new();
        Self::from_heap_inner(id, heap, &mut visiting, MAX_DATA_RECURSION_DEPTH)
    }

    /// `visiting` holds the arrays on the current conversion path.
    fn from_heap_inner(
        id: HeapId,
        heap: &Heap<impl ResourceTracker>,
        visiting: &mut AHashSet<HeapId>,
        depth_remaining: u16,
    ) -> RunResult<Self> {
        match heap.get(id)? {
            Value::Int(value) => Ok(Self::Int(value.clone())),
            Value::Array(_) if depth_remaining == 0 => Ok(Self::Truncated),
            Value::Array(items) => {
                if !visiting.insert(id) {
                    return Ok(Self::Cycle);
                }
                let items = items
                    .iter()
                    .map(|item| Self::from_heap_inner(*item, heap, visiting, depth_remaining - 1))
                    .collect::<RunResult<Vec<_>>>()?;
                visiting.remove(&id);
                Ok(Self::Array(items))
            }
        }
    }

    /// Returns the integer value, if this is an integer.
    #[must_use]
    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Self::Int(value) => Some(value),
            _ => None,
        }
    }
}

/// Renders the value behind `id` exactly as `print` writes it, without a trailing newline.
///
/// Arrays are walked with an explicit stack, so nesting depth is bounded by the heap
/// rather than by the native call stack. Only cycles are cut off.
pub(crate) fn render(id: HeapId, heap: &Heap<impl ResourceTracker>) -> RunResult<String> {
    let mut out = String::new();
    // arrays being written, each with the index of its next element
    let mut path: Vec<(HeapId, usize)> = Vec::new();
    let mut on_path = AHashSet::new();
    let mut next = Some(id);

    loop {
        if let Some(id) = next.take() {
            match heap.get(id)? {
                Value::Int(value) => out.push_str(&value.to_string()),
                Value::Array(_) if !on_path.insert(id) => out.push_str(ELIDED),
                Value::Array(_) => {
                    out.push_str("[ ");
                    path.push((id, 0));
                }
            }
        }

        let Some(top) = path.last_mut() else {
            break;
        };
        let (array, index) = *top;
        if let Some(item) = heap.get(array)?.children().get(index) {
            if index > 0 {
                out.push_str(", ");
            }
            top.1 += 1;
            next = Some(*item);
        } else {
            out.push_str(" ]");
            on_path.remove(&array);
            path.pop();
        }
    }
    Ok(out)
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Self::Int(BigInt::from(value))
    }
}

impl From<BigInt> for Object {
    fn from(value: BigInt) -> Self {
        Self::Int(value)
    }
}
