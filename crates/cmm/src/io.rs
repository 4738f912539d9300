use std::{
    borrow::Cow,
    cell::RefCell,
    io::{self, Write as _},
};

use crate::error::RunResult;

/// Trait for handling output from the `print` instruction.
///
/// Implement this trait to capture or redirect program output.
/// The default implementation `StdPrint` writes to stdout.
pub trait PrintWriter {
    /// Called once per printed value with its rendered text.
    ///
    /// Must not add a trailing newline; the VM emits it via [`Self::stdout_push`].
    fn stdout_write(&mut self, output: Cow<'_, str>) -> RunResult<()>;

    /// Add a single character to stdout.
    fn stdout_push(&mut self, end: char) -> RunResult<()>;
}

/// Default `PrintWriter` that writes to stdout.
#[derive(Debug)]
pub struct StdPrint;

thread_local! {
    /// Thread-local stdout buffer for `StdPrint`, flushed when the writer is dropped.
    ///
    /// Keeps program output contiguous when the CLI also writes diagnostics to stderr.
    static STDOUT_BUFFER: RefCell<String> = const { RefCell::new(String::new()) };
}

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> RunResult<()> {
        STDOUT_BUFFER.with(|buffer| buffer.borrow_mut().push_str(&output));
        Ok(())
    }

    fn stdout_push(&mut self, end: char) -> RunResult<()> {
        STDOUT_BUFFER.with(|buffer| buffer.borrow_mut().push(end));
        Ok(())
    }
}

impl Drop for StdPrint {
    fn drop(&mut self) {
        STDOUT_BUFFER.with(|buffer| {
            let mut buffer = buffer.borrow_mut();
            if buffer.is_empty() {
                return;
            }
            let _ = io::stdout().write_all(buffer.as_bytes());
            let _ = io::stdout().flush();
            buffer.clear();
        });
    }
}

/// A `PrintWriter` that collects all output into a string.
///
/// Useful for testing or capturing print output programmatically.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    /// Creates a new empty `CollectStringPrint`.
    #[must_use]
    pub fn new() -> Self {
        Self(String::new())
    }

    /// Returns the collected output as a string slice.
    #[must_use]
    pub fn output(&self) -> &str {
        self.0.as_str()
    }

    /// Consumes the writer and returns the collected output.
    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> RunResult<()> {
        self.0.push_str(&output);
        Ok(())
    }

    fn stdout_push(&mut self, end: char) -> RunResult<()> {
        self.0.push(end);
        Ok(())
    }
}

/// `PrintWriter` that ignores all output.
///
/// Useful for benchmarks and for callers that only inspect the final stack.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: Cow<'_, str>) -> RunResult<()> {
        Ok(())
    }

    fn stdout_push(&mut self, _end: char) -> RunResult<()> {
        Ok(())
    }
}
