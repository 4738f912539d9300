//! Tests for the `HeapStats` snapshot returned with every run.

use cmm::{CollectStringPrint, LimitedTracker, NoopTracer, Pipeline, ResourceLimits, Runner};
use pretty_assertions::assert_eq;

fn stats(source: &str, limits: ResourceLimits) -> cmm::HeapStats {
    let runner = Runner::from_source(source, &Pipeline::default()).unwrap();
    runner
        .run_with(LimitedTracker::new(limits), &mut CollectStringPrint::new(), NoopTracer)
        .unwrap()
        .heap_stats
}

/// A program that allocates nothing leaves an empty heap.
#[test]
fn empty_program_has_no_objects() {
    let stats = stats("main() { }", ResourceLimits::new());
    assert_eq!(stats.live_objects, 0);
    assert_eq!(stats.total_slots, 0);
    assert_eq!(stats.collections, 0);
}

/// Every literal push and every arithmetic result is a separate allocation.
#[test]
fn objects_are_counted_by_type() {
    let stats = stats("main() { array a[3]; x = 1 + 2; }", ResourceLimits::new());
    // the size 3, one zero shared by every element, the array, 1, 2 and the sum
    assert_eq!(stats.live_objects, 6);
    assert_eq!(stats.objects_by_type.get("Array"), Some(&1));
    assert_eq!(stats.objects_by_type.get("Int"), Some(&5));
    assert_eq!(stats.free_slots, 0);
}

/// After a final collection only bound values remain.
#[test]
fn collection_keeps_only_reachable_objects() {
    let stats = stats("main() { array a[3]; x = 1 + 2; }", ResourceLimits::new().gc_interval(1));
    // the array, its shared zero and x
    assert_eq!(stats.live_objects, 3, "{stats}");
    // later allocations reuse freed slots, so only five were ever needed
    assert_eq!(stats.total_slots, 5, "{stats}");
    assert_eq!(stats.free_slots, 2, "{stats}");
    assert!(stats.collections > 0);
}

/// The limit counts allocations over the whole run, so collection does not reset it.
#[test]
fn allocation_limit_is_a_memory_error() {
    let runner = Runner::from_source("main() { i = 0; while (1) { i = i + 1; } }", &Pipeline::default()).unwrap();
    let tracker = LimitedTracker::new(ResourceLimits::new().max_allocations(50));
    let err = runner
        .run_with(tracker, &mut CollectStringPrint::new(), NoopTracer)
        .unwrap_err();
    assert_eq!(err.kind_name(), "MemoryError");
}
