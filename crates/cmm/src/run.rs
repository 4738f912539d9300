//! Public interface for compiling and running C-- programs.

use std::collections::BTreeMap;

use crate::{
    bytecode::{Bytecode, Compiler, VM, load},
    error::Error,
    heap::{Heap, HeapStats},
    io::PrintWriter,
    object::Object,
    optimizer::Pipeline,
    parse::parse,
    resource::{LimitedTracker, NoLimitTracker, ResourceLimits, ResourceTracker},
    tracer::{NoopTracer, VmTracer},
};

/// Compiles C-- source to the persisted bytecode text format.
pub fn compile(source: &str) -> Result<String, Error> {
    compile_bytecode(source).map(|code| code.to_text())
}

/// Compiles C-- source to an in-memory program.
pub fn compile_bytecode(source: &str) -> Result<Bytecode, Error> {
    let program = parse(source)?;
    let code = Compiler::compile(&program)?;
    log::debug!(
        "compiled {} function(s) to {} instructions, {} labels",
        program.functions.len(),
        code.len(),
        code.labels().len()
    );
    Ok(code)
}

/// Parses C-- source and renders the syntax tree as pretty-printed JSON.
pub fn dump_ast(source: &str) -> Result<String, Error> {
    let program = parse(source)?;
    serde_json::to_string_pretty(&program).map_err(|err| Error::Serialization(err.to_string()))
}

/// Settings for [`run`]: which optimizer passes to apply and the resource limits.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub pipeline: Pipeline,
    pub limits: ResourceLimits,
}

impl RunOptions {
    /// No optimizations, default recursion limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipeline: Pipeline::default(),
            limits: ResourceLimits::new(),
        }
    }

    /// Selects passes from a letter string such as `"cd"`. Unknown letters are
    /// logged and ignored.
    #[must_use]
    pub fn optimizations(mut self, selection: &str) -> Self {
        let (pipeline, unknown) = Pipeline::parse(selection);
        for flag in unknown {
            log::warn!("ignoring unknown optimization '{flag}'");
        }
        self.pipeline = pipeline;
        self
    }

    #[must_use]
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// What a completed run left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// The operand stack, bottom first.
    pub stack: Vec<Object>,
    /// Bindings of the outermost (`main`) frame.
    pub globals: BTreeMap<String, Object>,
    pub heap_stats: HeapStats,
}

impl RunOutcome {
    /// Top of the final operand stack.
    #[must_use]
    pub fn top(&self) -> Option<&Object> {
        self.stack.last()
    }
}

/// Loads bytecode text, optimizes it and runs it to completion.
pub fn run(bytecode_text: &str, options: &RunOptions, print: &mut impl PrintWriter) -> Result<RunOutcome, Error> {
    let tracker = LimitedTracker::new(options.limits.clone());
    Runner::new(bytecode_text, &options.pipeline)?.run_with(tracker, print, NoopTracer)
}

/// A loaded and optimized program, ready to run any number of times.
///
/// # Example
/// ```
/// use cmm::{CollectStringPrint, Pipeline, Runner};
///
/// let runner = Runner::from_source("main() { print 3 + 4 * 2; }", &Pipeline::parse("cd").0).unwrap();
/// let mut print = CollectStringPrint::new();
/// runner.run_no_limits(&mut print).unwrap();
/// assert_eq!(print.output(), "11\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Runner {
    code: Bytecode,
}

impl Runner {
    /// Loads bytecode text and applies `pipeline`.
    pub fn new(bytecode_text: &str, pipeline: &Pipeline) -> Result<Self, Error> {
        Self::from_bytecode(load(bytecode_text)?, pipeline)
    }

    /// Compiles source, then loads it back through the text format.
    pub fn from_source(source: &str, pipeline: &Pipeline) -> Result<Self, Error> {
        Self::new(&compile(source)?, pipeline)
    }

    pub fn from_bytecode(code: Bytecode, pipeline: &Pipeline) -> Result<Self, Error> {
        Ok(Self {
            code: pipeline.run(code)?,
        })
    }

    /// The optimized program.
    #[must_use]
    pub fn code(&self) -> &Bytecode {
        &self.code
    }

    /// Runs with only the default recursion limit.
    pub fn run_no_limits(&self, print: &mut impl PrintWriter) -> Result<RunOutcome, Error> {
        self.run_with(NoLimitTracker, print, NoopTracer)
    }

    /// Runs with a custom resource tracker and tracer.
    ///
    /// Pass `&mut tracer` to inspect the tracer afterwards.
    pub fn run_with<T: ResourceTracker, Tr: VmTracer>(
        &self,
        tracker: T,
        print: &mut impl PrintWriter,
        tracer: Tr,
    ) -> Result<RunOutcome, Error> {
        let mut heap = Heap::new(tracker);
        let (stack, globals) = {
            let mut vm = VM::new(&self.code, &mut heap, print, tracer);
            vm.run()?;
            (vm.stack_objects()?, vm.global_objects()?)
        };
        let heap_stats = heap.heap_stats();
        log::debug!("{heap_stats}");
        Ok(RunOutcome {
            stack,
            globals,
            heap_stats,
        })
    }

    /// Serializes the runner to a binary format.
    ///
    /// The serialized data can be stored and later restored with `load()`,
    /// skipping parsing, loading and optimization.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Deserializes a runner from `dump()` output.
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::io::CollectStringPrint;

    #[test]
    fn outcome_reports_globals_and_stack() {
        let text = compile("main() { x = 6; array a[2]; a[1] = x * 7; return a[1]; }").unwrap();
        let mut print = CollectStringPrint::new();
        let outcome = run(&text, &RunOptions::new(), &mut print).unwrap();
        assert_eq!(outcome.top(), Some(&Object::from(42_i64)));
        assert_eq!(outcome.globals["x"], Object::from(6_i64));
        assert_eq!(outcome.globals["a"].to_string(), "[ 0, 42 ]");
    }

    #[test]
    fn dump_and_load_preserve_the_program() {
        let runner = Runner::from_source("main() { print 1 + 1; }", &Pipeline::parse("c").0).unwrap();
        let restored = Runner::load(&runner.dump().unwrap()).unwrap();
        assert_eq!(restored, runner);
        let mut print = CollectStringPrint::new();
        restored.run_no_limits(&mut print).unwrap();
        assert_eq!(print.output(), "2\n");
    }

    #[test]
    fn ast_dump_is_json() {
        let json = dump_ast("main() { print 1; }").unwrap();
        assert!(json.contains("\"name\": \"main\""), "{json}");
        assert!(json.contains("\"Int\": \"1\""), "{json}");
    }
}
