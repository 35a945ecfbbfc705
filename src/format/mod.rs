//! Formatters that render events while a stream is scanned
//!
//! Every formatter is an [`EventHandler`]. Formatters only read the
//! [`Execution`]; they never change it.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{Action, TestEvent};
use crate::execution::Execution;
use crate::scan::EventHandler;
use console::style;
use log::warn;
use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;

pub mod dots;
pub mod dotwriter;

pub use dots::DotFormatter;

/// The available output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatKind {
    /// Every output line, as `go test -v` prints it.
    StandardVerbose,
    /// Package level output only, as `go test` prints it.
    StandardQuiet,
    /// One line per test result.
    TestName,
    /// One line per package result.
    #[default]
    PkgName,
    /// One glyph per test result, grouped by package.
    Dots,
}

impl FromStr for FormatKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard-verbose" => Ok(FormatKind::StandardVerbose),
            "standard-quiet" => Ok(FormatKind::StandardQuiet),
            "testname" | "short-verbose" => Ok(FormatKind::TestName),
            "pkgname" | "short" => Ok(FormatKind::PkgName),
            "dots" => Ok(FormatKind::Dots),
            other => Err(Error::Config(format!("unknown format: {}", other))),
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormatKind::StandardVerbose => "standard-verbose",
            FormatKind::StandardQuiet => "standard-quiet",
            FormatKind::TestName => "testname",
            FormatKind::PkgName => "pkgname",
            FormatKind::Dots => "dots",
        };
        f.write_str(s)
    }
}

/// Display settings shared by all formatters.
#[derive(Debug, Clone, Default)]
pub struct FormatOptions {
    /// Import path prefix removed from package paths for display.
    pub package_prefix: Option<String>,
    /// Emit ANSI colours.
    pub color: bool,
}

impl FormatOptions {
    pub fn relative_package_path(&self, pkg: &str) -> String {
        relative_package_path(self.package_prefix.as_deref(), pkg)
    }

    /// Colour `text` by the outcome of `action`.
    pub fn paint(&self, action: Action, text: &str) -> String {
        let styled = style(text).force_styling(self.color);
        match action {
            Action::Pass => styled.green().to_string(),
            Action::Fail => styled.red().to_string(),
            Action::Skip => styled.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

/// Strip `prefix` from a package path. The prefix package itself becomes `.`.
pub fn relative_package_path(prefix: Option<&str>, pkg: &str) -> String {
    let Some(prefix) = prefix.filter(|p| !p.is_empty()) else {
        return pkg.to_string();
    };
    if pkg == prefix {
        return ".".to_string();
    }
    match pkg.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('/')) {
        Some(rel) => rel.to_string(),
        None => pkg.to_string(),
    }
}

/// The glyph drawn for a test outcome, empty for anything else.
pub fn dot_glyph(action: Action) -> &'static str {
    match action {
        Action::Pass => "·",
        Action::Fail => "✖",
        Action::Skip => "↷",
        _ => "",
    }
}

fn is_coverage_line(output: &str) -> bool {
    output.starts_with("coverage:") && output.trim_end().ends_with("% of statements")
}

/// Package output that explains a failure rather than summarising a result.
fn is_pkg_failure_output(event: &TestEvent) -> bool {
    let out = event.output.as_str();
    event.package_event()
        && event.action == Action::Output
        && !out.is_empty()
        && out != "PASS\n"
        && out != "FAIL\n"
        && !out.starts_with("ok  \t")
        && !out.starts_with("FAIL\t")
        && !out.starts_with("?   \t")
        && !is_coverage_line(out)
}

fn format_seconds(d: Duration) -> String {
    format!("{:.3}s", d.as_secs_f64())
}

/// Formats that render each event independently as text.
pub struct LineFormatter<W: Write, E: Write> {
    kind: FormatKind,
    out: W,
    err: E,
    opts: FormatOptions,
    started: HashSet<String>,
}

impl<W: Write, E: Write> LineFormatter<W, E> {
    /// Creates a formatter for `kind`. [`FormatKind::Dots`] renders without
    /// any terminal width management.
    pub fn new(kind: FormatKind, out: W, err: E, opts: FormatOptions) -> Self {
        LineFormatter {
            kind,
            out,
            err,
            opts,
            started: HashSet::new(),
        }
    }

    fn standard_quiet(&self, event: &TestEvent) -> String {
        if !event.package_event() || event.output == "PASS\n" || is_coverage_line(&event.output)
        {
            return String::new();
        }
        event.output.clone()
    }

    fn testname(&self, event: &TestEvent) -> String {
        if is_pkg_failure_output(event) {
            return event.output.clone();
        }
        if event.package_event() || !event.action.is_terminal() {
            return String::new();
        }
        let result = match event.action {
            Action::Pass => "PASS",
            Action::Fail => "FAIL",
            _ => "SKIP",
        };
        let pkg = self.opts.relative_package_path(&event.package);
        let name = if pkg == "." {
            event.test.clone()
        } else {
            format!("{}.{}", pkg, event.test)
        };
        format!(
            "{} {} ({:.2}s)\n",
            self.opts.paint(event.action, result),
            name,
            event.elapsed_duration().as_secs_f64()
        )
    }

    fn pkgname(&self, event: &TestEvent, exec: &Execution) -> String {
        if !event.package_event() || !event.action.is_terminal() {
            return String::new();
        }
        let Some(pkg) = exec.package(&event.package) else {
            return String::new();
        };
        let elapsed = if pkg.cached() {
            " (cached)".to_string()
        } else {
            match event.elapsed_duration() {
                Duration::ZERO => String::new(),
                d => format!(" ({})", format_seconds(d)),
            }
        };
        let coverage = match pkg.coverage() {
            "" => String::new(),
            c => format!(" ({})", c),
        };
        let glyph = match event.action {
            Action::Fail => "✖",
            _ if pkg.no_tests() => "∅",
            Action::Pass => "✓",
            _ => "∅",
        };
        format!(
            "{}  {}{}{}\n",
            self.opts.paint(event.action, glyph),
            self.opts.relative_package_path(&event.package),
            elapsed,
            coverage
        )
    }

    fn dots(&mut self, event: &TestEvent) -> String {
        if event.package_event() {
            return String::new();
        }
        let mut line = String::new();
        if event.action == Action::Run && self.started.insert(event.package.clone()) {
            if self.started.len() > 1 {
                line.push('\n');
            }
            line.push_str(&format!(
                "[{}]",
                self.opts.relative_package_path(&event.package)
            ));
        }
        let glyph = dot_glyph(event.action);
        if !glyph.is_empty() {
            line.push_str(&self.opts.paint(event.action, glyph));
        }
        line
    }
}

impl<W: Write, E: Write> EventHandler for LineFormatter<W, E> {
    fn on_event(&mut self, event: &TestEvent, execution: &Execution) -> Result<()> {
        let line = match self.kind {
            FormatKind::StandardVerbose if event.action == Action::Output => event.output.clone(),
            FormatKind::StandardVerbose => String::new(),
            FormatKind::StandardQuiet => self.standard_quiet(event),
            FormatKind::TestName => self.testname(event),
            FormatKind::PkgName => self.pkgname(event, execution),
            FormatKind::Dots => self.dots(event),
        };
        if !line.is_empty() {
            self.out.write_all(line.as_bytes())?;
            self.out.flush()?;
        }
        Ok(())
    }

    fn on_error(&mut self, text: &str) -> Result<()> {
        writeln!(self.err, "{}", text)?;
        Ok(())
    }
}

/// Build the formatter for `kind`.
///
/// The live dots formatter needs the terminal width; without it the plain
/// dots rendering is used instead.
pub fn new_formatter<'a, W, E>(
    kind: FormatKind,
    out: W,
    err: E,
    config: &Config,
) -> Box<dyn EventHandler + 'a>
where
    W: Write + 'a,
    E: Write + 'a,
{
    let opts = config.format_options();
    match (kind, config.terminal_width) {
        (FormatKind::Dots, Some(width)) => Box::new(DotFormatter::new(out, err, width, opts)),
        (FormatKind::Dots, None) => {
            warn!("Failed to detect terminal width for dots format.");
            Box::new(LineFormatter::new(kind, out, err, opts))
        }
        _ => Box::new(LineFormatter::new(kind, out, err, opts)),
    }
}
