use cmm::{LimitedTracker, NoPrint, NoopTracer, Object, Pipeline, ResourceLimits, Runner};
use criterion::{Bencher, Criterion, black_box, criterion_group, criterion_main};

/// Loop whose body is mostly constant arithmetic, so folding has work to do.
const FOLDABLE: &str = "
main() {
    total = 0;
    for (i = 0; i < 2000; i = i + 1) {
        total = total + (3 * 4 + 10 / 2 - 7) * (1 + 1);
    }
    return total;
}
";

/// Recursion and array traffic with nothing to fold.
const CALLS: &str = "
fib(n) {
    if (n < 2) { return n; }
    return fib(n - 1) + fib(n - 2);
}
main() {
    array memo[20];
    for (i = 0; i < len(memo); i = i + 1) { memo[i] = fib(i); }
    return memo[19];
}
";

/// Runs `source` after the given optimizations, checking the returned value once.
fn run_cmm(bench: &mut Bencher, source: &str, selection: &str, gc_interval: usize, expected: i64) {
    let runner = Runner::from_source(source, &Pipeline::parse(selection).0).unwrap();
    let limits = ResourceLimits::new().gc_interval(gc_interval);
    let outcome = runner
        .run_with(LimitedTracker::new(limits.clone()), &mut NoPrint, NoopTracer)
        .unwrap();
    assert_eq!(outcome.top(), Some(&Object::from(expected)));

    bench.iter(|| {
        let outcome = runner
            .run_with(LimitedTracker::new(limits.clone()), &mut NoPrint, NoopTracer)
            .unwrap();
        black_box(outcome);
    });
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("foldable");
    group.bench_function("plain", |b| run_cmm(b, FOLDABLE, "", 1024, 40_000));
    group.bench_function("folded", |b| run_cmm(b, FOLDABLE, "cd", 1024, 40_000));
    group.finish();

    let mut group = c.benchmark_group("calls");
    group.bench_function("gc_1024", |b| run_cmm(b, CALLS, "cd", 1024, 4181));
    group.bench_function("gc_16", |b| run_cmm(b, CALLS, "cd", 16, 4181));
    group.finish();

    c.bench_function("compile", |b| {
        b.iter(|| black_box(cmm::compile(black_box(CALLS)).unwrap()));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
