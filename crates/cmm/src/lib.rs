#![doc = include_str!("../../../README.md")]

mod builtins;
mod bytecode;
mod error;
mod expressions;
mod heap;
mod io;
mod object;
mod optimizer;
mod parse;
mod resource;
mod run;
pub mod tracer;
mod value;

pub use crate::{
    bytecode::{
        Bytecode, CompileError, Compiler, ENTRY_LABEL, Instruction, LabelTable, LoadError, LoadErrorKind, Opcode,
        load,
    },
    error::{Error, ErrorKind, RunError, RunResult},
    expressions::{Assign, Block, Call, Expr, FunctionDecl, Place, Program, Stmt},
    heap::{HeapId, HeapStats},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    object::Object,
    optimizer::{ConstantFolding, DeadCodeElimination, OptimizeError, OptimizerKind, OptimizerPass, Pipeline},
    parse::{CodeLoc, MAX_NESTING_DEPTH, ParseError, parse},
    resource::{
        DEFAULT_GC_INTERVAL, DEFAULT_MAX_ARRAY_LEN, DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker,
        MAX_DATA_RECURSION_DEPTH, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker,
    },
    run::{RunOptions, RunOutcome, Runner, compile, compile_bytecode, dump_ast, run},
    tracer::{NoopTracer, ProfilingReport, ProfilingTracer, RecordingTracer, StderrTracer, TraceEvent, VmTracer},
    value::BinaryOp,
};
