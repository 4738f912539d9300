//! VM execution tracing infrastructure.
//!
//! The VM is parameterized as `VM<'a, T: ResourceTracker, P: PrintWriter, Tr: VmTracer>`
//! and calls the hooks below at instruction dispatch, calls, returns and collections.
//! With [`NoopTracer`] every hook inlines to nothing.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | No-op (default) |
//! | [`StderrTracer`] | Human-readable execution log to stderr |
//! | [`ProfilingTracer`] | Opcode frequency counters, call depth and GC totals |
//! | [`RecordingTracer`] | Full event recording for post-mortem comparison |

use ahash::AHashMap;

use crate::bytecode::Opcode;

/// Trace event emitted during VM execution, captured by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// An instruction was dispatched at the given index.
    Instruction {
        ip: usize,
        opcode: Opcode,
        /// Operand stack depth before the instruction ran.
        stack_depth: usize,
    },
    /// A `call` pushed a new frame.
    Call {
        /// Label that was called.
        func_name: String,
        /// Call stack depth after the push.
        depth: usize,
    },
    /// A `return` popped a frame.
    Return {
        /// Call stack depth after the pop.
        depth: usize,
    },
    /// The garbage collector ran.
    Collect { freed: usize, live: usize },
}

/// Trait for VM execution tracing.
///
/// All methods have default no-op implementations. Implementations only
/// override the hooks they care about.
pub trait VmTracer: std::fmt::Debug {
    /// Called before each instruction dispatch in the main execution loop.
    ///
    /// # Arguments
    /// * `ip` - Index of the instruction in the loaded program
    /// * `opcode` - The opcode about to be executed
    /// * `stack_depth` - Number of values on the operand stack
    /// * `frame_depth` - Number of frames on the call stack
    #[inline(always)]
    fn on_instruction(&mut self, _ip: usize, _opcode: Opcode, _stack_depth: usize, _frame_depth: usize) {}

    /// Called when a new call frame is pushed.
    ///
    /// # Arguments
    /// * `func_name` - Label of the called function
    /// * `depth` - Call stack depth after the push
    #[inline(always)]
    fn on_call(&mut self, _func_name: &str, _depth: usize) {}

    /// Called when a call frame is popped.
    ///
    /// # Arguments
    /// * `depth` - Call stack depth after the pop
    #[inline(always)]
    fn on_return(&mut self, _depth: usize) {}

    /// Called after every garbage collection.
    ///
    /// # Arguments
    /// * `freed` - Number of slots freed by this collection
    /// * `live` - Number of live objects remaining
    #[inline(always)]
    fn on_gc(&mut self, _freed: usize, _live: usize) {}
}

// ============================================================================
// NoopTracer
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

// ============================================================================
// StderrTracer: human-readable execution log
// ============================================================================

/// Tracer that prints a human-readable execution log to stderr.
///
/// Output format:
/// ```text
/// [    0] Push  stack=0  frames=1
/// [    1] Call  stack=1  frames=1
///   >>> CALL square               depth=2
/// [    5] Access  stack=1  frames=2
///   <<< RETURN              depth=1
///   ### GC freed=12 live=3
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of instructions to trace before stopping. None = unlimited.
    limit: Option<usize>,
    count: usize,
    stopped: bool,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new stderr tracer that stops after `limit` instructions.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            count: 0,
            stopped: false,
        }
    }
}

impl VmTracer for StderrTracer {
    #[inline]
    fn on_instruction(&mut self, ip: usize, opcode: Opcode, stack_depth: usize, frame_depth: usize) {
        if self.stopped {
            return;
        }
        eprintln!("[{ip:>5}] {opcode:?}  stack={stack_depth}  frames={frame_depth}");
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count >= limit
        {
            eprintln!("--- trace limit reached ({limit} instructions) ---");
            self.stopped = true;
        }
    }

    fn on_call(&mut self, func_name: &str, depth: usize) {
        if self.stopped {
            return;
        }
        eprintln!("  >>> CALL {func_name:<20} depth={depth}");
    }

    fn on_return(&mut self, depth: usize) {
        if self.stopped {
            return;
        }
        eprintln!("  <<< RETURN              depth={depth}");
    }

    fn on_gc(&mut self, freed: usize, live: usize) {
        if self.stopped {
            return;
        }
        eprintln!("  ### GC freed={freed} live={live}");
    }
}

// ============================================================================
// ProfilingTracer: opcode frequency and call depth tracking
// ============================================================================

/// Tracer that collects execution statistics for profiling.
///
/// Retrieve results via [`ProfilingTracer::report`] after execution.
#[derive(Debug, Default)]
pub struct ProfilingTracer {
    opcode_counts: AHashMap<Opcode, u64>,
    total_instructions: u64,
    max_depth: usize,
    total_calls: u64,
    collections: u64,
    total_freed: u64,
}

/// Summary report from a profiling trace.
#[derive(Debug)]
pub struct ProfilingReport {
    /// Per-opcode execution counts, sorted by frequency (highest first).
    pub opcode_counts: Vec<(Opcode, u64)>,
    pub total_instructions: u64,
    /// Maximum call stack depth observed.
    pub max_depth: usize,
    pub total_calls: u64,
    /// Number of garbage collections observed.
    pub collections: u64,
    /// Slots freed across all collections.
    pub total_freed: u64,
}

impl ProfilingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a profiling report from the collected data.
    ///
    /// Opcode counts are sorted by frequency (most executed first), ties by opcode name.
    #[must_use]
    pub fn report(&self) -> ProfilingReport {
        let mut opcode_counts: Vec<_> = self.opcode_counts.iter().map(|(&k, &v)| (k, v)).collect();
        opcode_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.name().cmp(b.0.name())));
        ProfilingReport {
            opcode_counts,
            total_instructions: self.total_instructions,
            max_depth: self.max_depth,
            total_calls: self.total_calls,
            collections: self.collections,
            total_freed: self.total_freed,
        }
    }
}

impl VmTracer for ProfilingTracer {
    #[inline]
    fn on_instruction(&mut self, _ip: usize, opcode: Opcode, _stack_depth: usize, frame_depth: usize) {
        *self.opcode_counts.entry(opcode).or_insert(0) += 1;
        self.total_instructions += 1;
        self.max_depth = self.max_depth.max(frame_depth);
    }

    #[inline]
    fn on_call(&mut self, _func_name: &str, depth: usize) {
        self.total_calls += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    fn on_gc(&mut self, freed: usize, _live: usize) {
        self.collections += 1;
        self.total_freed += freed as u64;
    }
}

impl std::fmt::Display for ProfilingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== VM Profiling Report ===")?;
        writeln!(f, "Total instructions: {}", self.total_instructions)?;
        writeln!(f, "Total calls:        {}", self.total_calls)?;
        writeln!(f, "Max call depth:     {}", self.max_depth)?;
        writeln!(f, "Collections:        {}", self.collections)?;
        writeln!(f, "Slots freed:        {}", self.total_freed)?;
        writeln!(f)?;
        writeln!(f, "--- Opcode Frequency ---")?;
        for (opcode, count) in &self.opcode_counts {
            let pct = (*count as f64 / self.total_instructions as f64) * 100.0;
            writeln!(f, "  {:<20} {count:>10}  ({pct:>5.1}%)", opcode.name())?;
        }
        Ok(())
    }
}

// ============================================================================
// RecordingTracer: full event recording
// ============================================================================

/// Tracer that records all events for post-mortem analysis.
///
/// Allocates per event, so use it only for short executions or tests.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
    /// Optional limit on number of events recorded.
    limit: Option<usize>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new recording tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::with_capacity(limit.min(1024)),
            limit: Some(limit),
        }
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    fn record(&mut self, event: TraceEvent) {
        if self.limit.is_some_and(|l| self.events.len() >= l) {
            return;
        }
        self.events.push(event);
    }
}

impl VmTracer for RecordingTracer {
    #[inline]
    fn on_instruction(&mut self, ip: usize, opcode: Opcode, stack_depth: usize, _frame_depth: usize) {
        self.record(TraceEvent::Instruction {
            ip,
            opcode,
            stack_depth,
        });
    }

    fn on_call(&mut self, func_name: &str, depth: usize) {
        self.record(TraceEvent::Call {
            func_name: func_name.to_owned(),
            depth,
        });
    }

    fn on_return(&mut self, depth: usize) {
        self.record(TraceEvent::Return { depth });
    }

    fn on_gc(&mut self, freed: usize, live: usize) {
        self.record(TraceEvent::Collect { freed, live });
    }
}

/// Lets callers keep ownership of a tracer and read it back after the run.
impl<Tr: VmTracer> VmTracer for &mut Tr {
    #[inline]
    fn on_instruction(&mut self, ip: usize, opcode: Opcode, stack_depth: usize, frame_depth: usize) {
        (**self).on_instruction(ip, opcode, stack_depth, frame_depth);
    }

    #[inline]
    fn on_call(&mut self, func_name: &str, depth: usize) {
        (**self).on_call(func_name, depth);
    }

    #[inline]
    fn on_return(&mut self, depth: usize) {
        (**self).on_return(depth);
    }

    #[inline]
    fn on_gc(&mut self, freed: usize, live: usize) {
        (**self).on_gc(freed, live);
    }
}
