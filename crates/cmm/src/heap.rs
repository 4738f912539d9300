use std::{collections::BTreeMap, fmt};

use crate::{
    error::{ErrorKind, RunError, RunResult},
    resource::{ResourceError, ResourceTracker},
    value::Value,
};

/// Snapshot of heap state at a point in time.
///
/// The `objects_by_type` map uses `BTreeMap` for deterministic iteration order,
/// making snapshots suitable for display and comparison without sort overhead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Total number of live objects on the heap.
    pub live_objects: usize,
    /// Number of free (recycled) slots available for reuse.
    pub free_slots: usize,
    /// Total heap capacity (live + free).
    pub total_slots: usize,
    /// Breakdown of live objects by variant name ("Int", "Array").
    pub objects_by_type: BTreeMap<&'static str, usize>,
    /// Number of garbage collections run so far.
    pub collections: usize,
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "heap: {} live, {} free, {} slots, {} collection(s)",
            self.live_objects, self.free_slots, self.total_slots, self.collections
        )?;
        for (type_name, count) in &self.objects_by_type {
            write!(f, "\n  {type_name}: {count}")?;
        }
        Ok(())
    }
}

/// Handle to a value stored in the heap arena.
///
/// The generation is bumped every time a slot is freed, so a handle kept past the
/// collection that freed its slot is detected as dangling instead of silently
/// reading whatever now lives there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId {
    index: u32,
    generation: u32,
}

impl HeapId {
    /// Returns the raw slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<Value>,
}

/// Reachability marks produced by [`Heap::mark`], indexed by slot.
#[derive(Debug)]
pub(crate) struct MarkSet(Vec<bool>);

impl MarkSet {
    #[inline]
    pub fn is_marked(&self, id: HeapId) -> bool {
        self.0.get(id.index()).copied().unwrap_or(false)
    }
}

/// Arena of runtime values with a free list and mark-sweep collection.
///
/// Every slot is either live (`data` is `Some`) or on the free list. The heap does not
/// know about frames: the VM supplies roots to [`Heap::mark`] and prunes frame ownership
/// lists against the resulting [`MarkSet`] before calling [`Heap::sweep`].
#[derive(Debug)]
pub(crate) struct Heap<T: ResourceTracker> {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    tracker: T,
    /// Stack-mutating instructions executed since the last collection.
    ops_since_gc: usize,
    collections: usize,
}

impl<T: ResourceTracker> Heap<T> {
    pub fn new(tracker: T) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            tracker,
            ops_since_gc: 0,
            collections: 0,
        }
    }

    /// Allocates a new value, reusing a freed slot when one is available.
    pub fn allocate(&mut self, value: Value) -> Result<HeapId, ResourceError> {
        self.tracker.on_allocate()?;
        let id = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.data = Some(value);
            HeapId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).map_err(|_| ResourceError::Allocation {
                limit: u32::MAX as usize,
                count: self.slots.len() + 1,
            })?;
            self.slots.push(Slot {
                generation: 0,
                data: Some(value),
            });
            HeapId { index, generation: 0 }
        };
        Ok(id)
    }

    /// Resolves a handle, failing with `DanglingHandle` if its slot was freed.
    pub fn get(&self, id: HeapId) -> RunResult<&Value> {
        match self.slots.get(id.index()) {
            Some(Slot {
                generation,
                data: Some(value),
            }) if *generation == id.generation => Ok(value),
            _ => Err(dangling(id)),
        }
    }

    pub fn get_mut(&mut self, id: HeapId) -> RunResult<&mut Value> {
        match self.slots.get_mut(id.index()) {
            Some(Slot {
                generation,
                data: Some(value),
            }) if *generation == id.generation => Ok(value),
            _ => Err(dangling(id)),
        }
    }

    /// Counts one stack-mutating instruction towards the next collection.
    #[inline]
    pub fn record_stack_op(&mut self) {
        self.ops_since_gc = self.ops_since_gc.wrapping_add(1);
    }

    /// Returns whether enough stack-mutating instructions ran since the last collection.
    #[inline]
    pub fn should_gc(&self) -> bool {
        self.ops_since_gc >= self.tracker.gc_interval()
    }

    /// Mark phase: every value reachable from `roots` through array elements.
    ///
    /// Handles that do not resolve are skipped; they cannot keep anything alive.
    pub fn mark(&self, roots: impl IntoIterator<Item = HeapId>) -> MarkSet {
        let mut reachable = vec![false; self.slots.len()];
        let mut work_list: Vec<HeapId> = roots.into_iter().collect();

        while let Some(id) = work_list.pop() {
            let idx = id.index();
            if reachable.get(idx).copied().unwrap_or(true) {
                continue;
            }
            if let Ok(value) = self.get(id) {
                reachable[idx] = true;
                work_list.extend_from_slice(value.children());
            }
        }
        MarkSet(reachable)
    }

    /// Sweep phase: frees every live slot not in `marks`. Returns how many were freed.
    pub fn sweep(&mut self, marks: &MarkSet) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.data.is_none() || marks.0.get(index).copied().unwrap_or(false) {
                continue;
            }
            slot.data = None;
            slot.generation = slot.generation.wrapping_add(1);
            // slots.len() fits in u32, enforced by `allocate`
            self.free_list.push(index as u32);
            self.tracker.on_free();
            freed += 1;
        }
        self.ops_since_gc = 0;
        self.collections += 1;
        freed
    }

    /// Returns a snapshot of the current heap state.
    pub fn heap_stats(&self) -> HeapStats {
        let mut live_objects = 0;
        let mut objects_by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
        for value in self.slots.iter().filter_map(|slot| slot.data.as_ref()) {
            live_objects += 1;
            *objects_by_type.entry(value.type_name()).or_insert(0) += 1;
        }
        HeapStats {
            live_objects,
            free_slots: self.free_list.len(),
            total_slots: self.slots.len(),
            objects_by_type,
            collections: self.collections,
        }
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }
}

fn dangling(id: HeapId) -> RunError {
    RunError::new(ErrorKind::DanglingHandle, format!("handle {id} refers to a freed slot"))
}
