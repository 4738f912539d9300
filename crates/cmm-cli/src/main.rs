use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    time::{Duration, Instant},
};

use clap::{Args, Parser, Subcommand};
use cmm::{
    Error, LimitedTracker, NoopTracer, ResourceLimits, RunOptions, RunOutcome, Runner, StderrTracer, StdPrint, compile,
    dump_ast,
};

/// Extension appended to a source path for its compiled bytecode.
const BYTECODE_EXT: &str = "cmmbin";

/// C-- compiler and bytecode VM.
///
/// With only a FILE, compiles it next to the source and runs the result.
#[derive(Parser)]
#[command(name = "cmm", version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Source file to compile and run
    file: Option<PathBuf>,

    #[command(flatten)]
    run: RunFlags,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a source file to `<FILE>.cmmbin`
    Compile {
        file: PathBuf,
        /// Where to write the bytecode instead
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        info: bool,
    },
    /// Run compiled bytecode; a source path has `.cmmbin` appended
    Run {
        file: PathBuf,
        #[command(flatten)]
        run: RunFlags,
    },
    /// Print the syntax tree of a source file as JSON
    Ast { file: PathBuf },
    /// Print the bytecode of a source file after optimization
    Dump {
        file: PathBuf,
        #[arg(short, long, default_value = "")]
        optimizations: String,
    },
}

#[derive(Args)]
struct RunFlags {
    /// Optimizer passes to apply, in order: `c` constant folding, `d` dead code
    #[arg(short, long, default_value = "")]
    optimizations: String,
    /// Report timings and heap statistics on stderr
    #[arg(short, long)]
    info: bool,
    /// Log every executed instruction to stderr
    #[arg(long)]
    trace: bool,
    /// Stack operations between garbage collections
    #[arg(long)]
    gc_interval: Option<usize>,
    /// Maximum call depth
    #[arg(long)]
    max_depth: Option<usize>,
}

impl RunFlags {
    fn options(&self) -> RunOptions {
        let mut limits = ResourceLimits::new();
        if let Some(interval) = self.gc_interval {
            limits = limits.gc_interval(interval);
        }
        if let Some(depth) = self.max_depth {
            limits = limits.max_recursion_depth(Some(depth));
        }
        RunOptions::new().optimizations(&self.optimizations).limits(limits)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::Compile { file, output, info }) => compile_file(&file, output.as_deref(), info).map(drop),
        Some(Command::Run { file, run }) => run_file(&bytecode_path(&file), &run),
        Some(Command::Ast { file }) => print_ast(&file),
        Some(Command::Dump { file, optimizations }) => dump(&file, &optimizations),
        None => match cli.file {
            Some(file) => compile_file(&file, None, cli.run.info).and_then(|compiled| run_file(&compiled, &cli.run)),
            None => Err(CliError::Usage("no input file given, see --help".to_owned())),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Compiles `file` and writes the bytecode. Returns the path written.
fn compile_file(file: &Path, output: Option<&Path>, info: bool) -> Result<PathBuf, CliError> {
    let source = read(file)?;
    let start = Instant::now();
    let text = compile(&source)?;
    let target = output.map_or_else(|| bytecode_path(file), Path::to_path_buf);
    fs::write(&target, text).map_err(|err| CliError::Io(target.clone(), err))?;
    if info {
        eprintln!("compiled {} in {:?}", target.display(), start.elapsed());
    }
    Ok(target)
}

fn run_file(file: &Path, flags: &RunFlags) -> Result<(), CliError> {
    let text = read(file)?;
    let options = flags.options();

    let start = Instant::now();
    let runner = Runner::new(&text, &options.pipeline)?;
    let loaded = start.elapsed();

    let tracker = LimitedTracker::new(options.limits);
    let mut print = StdPrint;
    let start = Instant::now();
    let outcome = if flags.trace {
        runner.run_with(tracker, &mut print, StderrTracer::new())
    } else {
        runner.run_with(tracker, &mut print, NoopTracer)
    };
    // flush program output before any report
    drop(print);
    let outcome = outcome?;

    if flags.info {
        report(&outcome, loaded, start.elapsed());
    }
    Ok(())
}

fn print_ast(file: &Path) -> Result<(), CliError> {
    let json = dump_ast(&read(file)?)?;
    println!("{json}");
    Ok(())
}

fn dump(file: &Path, optimizations: &str) -> Result<(), CliError> {
    let source = read(file)?;
    let options = RunOptions::new().optimizations(optimizations);
    let runner = Runner::from_source(&source, &options.pipeline)?;
    print!("{}", runner.code());
    Ok(())
}

fn report(outcome: &RunOutcome, loaded: Duration, ran: Duration) {
    eprintln!("loaded in {loaded:?}, ran in {ran:?}");
    eprintln!("{}", outcome.heap_stats);
    if let Some(top) = outcome.top() {
        eprintln!("top of stack: {top}");
    }
}

/// `prog.cmm` becomes `prog.cmm.cmmbin`; a path already ending in `.cmmbin` is kept.
fn bytecode_path(file: &Path) -> PathBuf {
    if file.extension().is_some_and(|ext| ext == BYTECODE_EXT) {
        return file.to_path_buf();
    }
    let mut path = file.as_os_str().to_owned();
    path.push(".");
    path.push(BYTECODE_EXT);
    PathBuf::from(path)
}

fn read(file: &Path) -> Result<String, CliError> {
    log::debug!("reading {}", file.display());
    fs::read_to_string(file).map_err(|err| CliError::Io(file.to_path_buf(), err))
}

#[derive(Debug)]
enum CliError {
    Io(PathBuf, std::io::Error),
    Cmm(Error),
    Usage(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, err) => write!(f, "{}: {err}", path.display()),
            Self::Cmm(err) => write!(f, "{err}"),
            Self::Usage(message) => f.write_str(message),
        }
    }
}

impl From<Error> for CliError {
    fn from(err: Error) -> Self {
        Self::Cmm(err)
    }
}
