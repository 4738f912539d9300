//! Garbage collection and the call protocol under aggressive collection.
//!
//! Collecting after every stack-mutating instruction must never free a value that
//! is still on the operand stack, bound in any frame, or held inside a live array.

use cmm::{
    CollectStringPrint, LimitedTracker, NoopTracer, Pipeline, RecordingTracer, ResourceLimits, RunOutcome, Runner,
    TraceEvent,
};
use pretty_assertions::assert_eq;

fn run_collecting(source: &str, interval: usize) -> (String, RunOutcome) {
    let runner = Runner::from_source(source, &Pipeline::default()).unwrap();
    let tracker = LimitedTracker::new(ResourceLimits::new().gc_interval(interval));
    let mut print = CollectStringPrint::new();
    let outcome = runner.run_with(tracker, &mut print, NoopTracer).unwrap();
    (print.into_output(), outcome)
}

/// Runs `source` once without collection pressure and once per interval in 1..=5,
/// checking that the observable results agree.
fn assert_gc_transparent(source: &str) {
    let (expected_output, expected) = run_collecting(source, usize::MAX);
    assert_eq!(expected.heap_stats.collections, 0);
    for interval in 1..=5 {
        let (output, outcome) = run_collecting(source, interval);
        assert_eq!(output, expected_output, "gc interval {interval}");
        assert_eq!(outcome.stack, expected.stack, "gc interval {interval}");
        assert_eq!(outcome.globals, expected.globals, "gc interval {interval}");
        assert!(outcome.heap_stats.collections > 0, "gc interval {interval}");
    }
}

// =============================================================================
// 1. Values reachable only through one root kind
// =============================================================================

#[test]
fn operands_pending_on_the_stack_survive() {
    assert_gc_transparent("main() { print 1 + 2 * (3 + 4 * (5 + 6)); }");
}

#[test]
fn array_elements_survive_their_temporaries() {
    assert_gc_transparent(
        "
main() {
    array a[4];
    for (i = 0; i < 4; i = i + 1) { a[i] = i * i + 100; }
    print a;
}
",
    );
}

#[test]
fn nested_arrays_survive_through_the_outer_array() {
    assert_gc_transparent(
        "
make(n) {
    array inner[n];
    inner[n - 1] = n;
    return inner;
}
main() {
    array outer[3];
    for (i = 0; i < 3; i = i + 1) { outer[i] = make(i + 1); }
    print outer;
}
",
    );
}

// =============================================================================
// 2. Call protocol
// =============================================================================

#[test]
fn caller_bindings_survive_callee_collections() {
    assert_gc_transparent(
        "
churn(n) {
    t = 0;
    while (n) { t = t + n; n = n - 1; }
    return t;
}
main() {
    keep = 12345678901234567890;
    x = churn(10);
    print keep;
    print x;
}
",
    );
}

#[test]
fn returned_values_outlive_the_callee_frame() {
    assert_gc_transparent(
        "
pair(a, b) {
    array p[2];
    p[0] = a;
    p[1] = b;
    return p;
}
main() {
    p = pair(7, pair(8, 9));
    print p;
    q = p[1];
    print q[0];
}
",
    );
}

#[test]
fn deep_recursion_under_collection() {
    assert_gc_transparent(
        "
fib(n) {
    if (n < 2) { return n; }
    return fib(n - 1) + fib(n - 2);
}
main() { print fib(12); }
",
    );
}

#[test]
fn calls_and_returns_are_traced_in_order() {
    let source = "
inner() { return 1; }
outer() { return inner() + 1; }
main() { print outer(); }
";
    let runner = Runner::from_source(source, &Pipeline::default()).unwrap();
    let mut tracer = RecordingTracer::new();
    let mut print = CollectStringPrint::new();
    runner
        .run_with(LimitedTracker::new(ResourceLimits::new()), &mut print, &mut tracer)
        .unwrap();
    assert_eq!(print.output(), "2\n");

    let calls: Vec<_> = tracer
        .events()
        .iter()
        .filter(|event| !matches!(event, TraceEvent::Instruction { .. }))
        .cloned()
        .collect();
    assert_eq!(
        calls,
        vec![
            TraceEvent::Call {
                func_name: "outer".to_owned(),
                depth: 2
            },
            TraceEvent::Call {
                func_name: "inner".to_owned(),
                depth: 3
            },
            TraceEvent::Return { depth: 2 },
            TraceEvent::Return { depth: 1 },
        ]
    );
}

// =============================================================================
// 3. Heap accounting
// =============================================================================

#[test]
fn collection_bounds_the_live_heap() {
    let source = "main() { i = 0; while (i < 100) { i = i + 1; } print i; }";

    let (output, unbounded) = run_collecting(source, usize::MAX);
    assert_eq!(output, "100\n");
    assert!(unbounded.heap_stats.live_objects >= 400, "{}", unbounded.heap_stats);

    let (output, bounded) = run_collecting(source, 1);
    assert_eq!(output, "100\n");
    assert!(bounded.heap_stats.live_objects < 10, "{}", bounded.heap_stats);
    assert!(bounded.heap_stats.free_slots > 0, "{}", bounded.heap_stats);
}
