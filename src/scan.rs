//! Scanning event streams into an [`Execution`]
//!
//! The stdout stream carries one JSON event per line and is consumed
//! incrementally, so handlers can render while a long run is still in
//! progress. The optional stderr stream carries free-text diagnostics.

use crate::error::{Error, Result};
use crate::event::{parse_event, TestEvent};
use crate::execution::Execution;
use log::{debug, warn};
use std::io::{BufRead, BufReader, Read};

/// Receives every event of a scan.
///
/// Both methods are called synchronously from the thread driving the scan,
/// so implementations need no locking.
pub trait EventHandler {
    /// Called once per decoded event, after the event was applied to `execution`.
    fn on_event(&mut self, event: &TestEvent, execution: &Execution) -> Result<()>;

    /// Called for free-standing lines that are not test events.
    fn on_error(&mut self, text: &str) -> Result<()>;
}

/// Input streams and policies for one scan.
pub struct ScanConfig<'a> {
    /// The stream of JSON events.
    pub stdout: Box<dyn Read + 'a>,
    /// An optional stream of diagnostics, read after `stdout` reaches EOF.
    pub stderr: Option<Box<dyn Read + 'a>>,
    pub handler: Option<&'a mut dyn EventHandler>,
    /// Pass lines that are not events to the handler instead of failing.
    pub ignore_non_json_output_lines: bool,
    /// Return the first handler error immediately instead of after EOF.
    pub stop_on_handler_error: bool,
}

impl<'a> ScanConfig<'a> {
    pub fn new(stdout: impl Read + 'a) -> Self {
        ScanConfig {
            stdout: Box::new(stdout),
            stderr: None,
            handler: None,
            ignore_non_json_output_lines: false,
            stop_on_handler_error: false,
        }
    }

    pub fn with_stderr(mut self, stderr: impl Read + 'a) -> Self {
        self.stderr = Some(Box::new(stderr));
        self
    }

    pub fn with_handler(mut self, handler: &'a mut dyn EventHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn ignore_non_json_output_lines(mut self, ignore: bool) -> Self {
        self.ignore_non_json_output_lines = ignore;
        self
    }

    pub fn stop_on_handler_error(mut self, stop: bool) -> Self {
        self.stop_on_handler_error = stop;
        self
    }
}

/// Module download chatter from the go tool, which is not an error.
fn is_go_module_output(line: &str) -> bool {
    ["go: downloading ", "go: finding ", "go: extracting "]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

struct Scanner<'a, 'e> {
    execution: &'e mut Execution,
    handler: Option<&'a mut dyn EventHandler>,
    stop_on_handler_error: bool,
    first_handler_error: Option<Error>,
}

impl Scanner<'_, '_> {
    /// Record a handler failure. Returns an error only when the scan must stop.
    fn handler_result(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(err) if self.stop_on_handler_error => Err(err),
            Err(err) => {
                warn!("Event handler failed: {}", err);
                if self.first_handler_error.is_none() {
                    self.first_handler_error = Some(err);
                }
                Ok(())
            }
        }
    }

    fn event(&mut self, event: TestEvent) -> Result<()> {
        self.execution.apply(&event);
        let result = match self.handler.as_deref_mut() {
            Some(handler) => handler.on_event(&event, self.execution),
            None => Ok(()),
        };
        self.handler_result(result)
    }

    fn error_line(&mut self, text: &str) -> Result<()> {
        self.execution.add_error(text);
        let result = match self.handler.as_deref_mut() {
            Some(handler) => handler.on_error(text),
            None => Ok(()),
        };
        self.handler_result(result)
    }
}

/// Read lines until EOF, handing each one (without the line ending) to `f`.
fn for_each_line<R, F>(reader: R, mut f: F) -> Result<()>
where
    R: Read,
    F: FnMut(&[u8]) -> Result<()>,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let line = buf
            .strip_suffix(b"\n")
            .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
            .unwrap_or(&buf);
        f(line)?;
    }
}

/// Scan the streams in `config`, applying every event to `execution`.
///
/// On error, `execution` keeps every event applied before the failure.
pub fn scan_test_output(execution: &mut Execution, config: ScanConfig<'_>) -> Result<()> {
    let ScanConfig {
        stdout,
        stderr,
        handler,
        ignore_non_json_output_lines,
        stop_on_handler_error,
    } = config;

    let mut scanner = Scanner {
        execution,
        handler,
        stop_on_handler_error,
        first_handler_error: None,
    };

    for_each_line(stdout, |line| {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        match parse_event(line) {
            Ok(event) => scanner.event(event),
            Err(err) if ignore_non_json_output_lines => {
                debug!("Ignoring line that is not a test event: {}", err);
                scanner.error_line(&String::from_utf8_lossy(line))
            }
            Err(err) => Err(err),
        }
    })?;

    if let Some(stderr) = stderr {
        for_each_line(stderr, |line| {
            let text = String::from_utf8_lossy(line);
            if text.trim().is_empty() || is_go_module_output(&text) {
                return Ok(());
            }
            scanner.error_line(&text)
        })?;
    }

    match scanner.first_handler_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Scan a single stream of events into a new execution.
pub fn scan_reader(reader: impl Read) -> Result<Execution> {
    let mut execution = Execution::new();
    scan_test_output(&mut execution, ScanConfig::new(reader))?;
    Ok(execution)
}

/// Scan several streams one after the other into the same execution, so
/// packages accumulate across files. Stops at the first stream that fails.
pub fn merge_streams<I, R>(execution: &mut Execution, streams: I) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: Read,
{
    for stream in streams {
        scan_test_output(execution, ScanConfig::new(stream))?;
    }
    Ok(())
}
