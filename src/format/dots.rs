//! Live dots formatter
//!
//! Each package gets one line of glyphs. After every event the whole block is
//! redrawn with the most recently updated packages at the bottom, so finished
//! packages settle at the top in the order they finished.

use super::dotwriter::DotWriter;
use super::{dot_glyph, FormatOptions};
use crate::error::Result;
use crate::event::{Action, TestEvent};
use crate::execution::{Execution, Package};
use crate::scan::EventHandler;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

/// Glyph appended when a line reaches the terminal width.
const WRAP_MARKER: &str = "↲";

/// Width of the time column plus the padding around it.
const FIXED_PREFIX_WIDTH: usize = 8;

/// The glyphs drawn so far for one package.
#[derive(Debug, Default)]
pub struct DotLine {
    runes: usize,
    buf: String,
    last_update: u64,
    full: bool,
}

impl DotLine {
    /// Append a glyph, unless the line is already full.
    pub fn update(&mut self, dot: &str) {
        if self.full || dot.is_empty() {
            return;
        }
        self.buf.push_str(dot);
        self.runes += 1;
    }

    /// Mark the line as full once it reaches the terminal width. One column is
    /// kept free for the wrap marker.
    pub fn check_width(&mut self, prefix: usize, terminal: usize) {
        const PADDING: usize = 1;
        if !self.full && prefix + self.runes + PADDING >= terminal {
            self.buf.push_str(WRAP_MARKER);
            self.full = true;
        }
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Number of glyphs appended, not counting the wrap marker.
    pub fn glyphs(&self) -> usize {
        self.runes
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

/// Renders one line of dots per package, redrawn in place.
pub struct DotFormatter<W: Write, E: Write> {
    pkgs: HashMap<String, DotLine>,
    order: Vec<String>,
    writer: DotWriter<W>,
    err: E,
    term_width: usize,
    opts: FormatOptions,
    seq: u64,
}

impl<W: Write, E: Write> DotFormatter<W, E> {
    pub fn new(out: W, err: E, term_width: usize, opts: FormatOptions) -> Self {
        DotFormatter {
            pkgs: HashMap::new(),
            order: Vec::new(),
            writer: DotWriter::new(out),
            err,
            term_width,
            opts,
            seq: 0,
        }
    }

    /// The line for `pkg`, if any event was seen for it.
    pub fn line(&self, pkg: &str) -> Option<&DotLine> {
        self.pkgs.get(pkg)
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write, E: Write> EventHandler for DotFormatter<W, E> {
    fn on_event(&mut self, event: &TestEvent, execution: &Execution) -> Result<()> {
        if !self.pkgs.contains_key(&event.package) {
            self.order.push(event.package.clone());
        }
        self.seq += 1;
        let line = self.pkgs.entry(event.package.clone()).or_default();
        line.last_update = self.seq;

        if !event.package_event() {
            let glyph = dot_glyph(event.action);
            if !glyph.is_empty() {
                line.update(&self.opts.paint(event.action, glyph));
            }
        }
        if matches!(event.action, Action::Output | Action::Bench) {
            return Ok(());
        }

        let DotFormatter {
            pkgs,
            order,
            writer,
            term_width,
            opts,
            ..
        } = self;
        order.sort_by_key(|pkg| pkgs.get(pkg).map(|l| l.last_update).unwrap_or(0));

        for pkg in order.iter() {
            let Some(line) = pkgs.get_mut(pkg) else {
                continue;
            };
            let (prefix, width) =
                fmt_dot_pkg_time(&opts.relative_package_path(pkg), execution.package(pkg));
            line.check_width(width, *term_width);
            writeln!(writer, "{}{}", prefix, line.as_str())?;
        }
        writer.flush()?;
        Ok(())
    }

    fn on_error(&mut self, text: &str) -> Result<()> {
        writeln!(self.err, "{}", text)?;
        Ok(())
    }
}

/// The time column for a package, shown as a cache marker when the result
/// was cached.
fn fmt_pkg_time(pkg: &Package) -> String {
    if pkg.cached() {
        return "🖴".to_string();
    }
    let elapsed = pkg.elapsed();
    if elapsed == Duration::ZERO {
        String::new()
    } else if elapsed < Duration::from_secs(1) {
        fmt_short_duration(elapsed)
    } else if elapsed < Duration::from_secs(10) {
        fmt_short_duration(Duration::from_millis(elapsed.as_millis() as u64))
    } else if elapsed < Duration::from_secs(60) {
        format!("{}s", elapsed.as_secs())
    } else {
        format!("{}m{}s", elapsed.as_secs() / 60, elapsed.as_secs() % 60)
    }
}

/// Formats a duration below ten seconds in its largest whole unit, keeping
/// only the significant fraction digits: `1.5s`, `250ms`, `500µs`.
fn fmt_short_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    let (unit, scale): (&str, u128) = if nanos < 1_000 {
        ("ns", 1)
    } else if nanos < 1_000_000 {
        ("µs", 1_000)
    } else if nanos < 1_000_000_000 {
        ("ms", 1_000_000)
    } else {
        ("s", 1_000_000_000)
    };
    let (whole, frac) = (nanos / scale, nanos % scale);
    if frac == 0 {
        return format!("{}{}", whole, unit);
    }
    let frac = format!("{:0width$}", frac, width = scale.ilog10() as usize);
    format!("{}.{}{}", whole, frac.trim_end_matches('0'), unit)
}

/// Returns the line prefix for a package and the width it occupies.
pub fn fmt_dot_pkg_time(pkg_path: &str, pkg: Option<&Package>) -> (String, usize) {
    let time = pkg.map(fmt_pkg_time).unwrap_or_default();
    (
        format!("{:>6} {} ", time, pkg_path),
        pkg_path.chars().count() + FIXED_PREFIX_WIDTH,
    )
}
