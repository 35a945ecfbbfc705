//! End of run summary
//!
//! Prints the totals of an [`Execution`] and replays the captured output of
//! skipped and failed tests.

use crate::error::Result;
use crate::execution::{Execution, TestCase};
use crate::format::FormatOptions;
use std::io::Write;
use std::time::Duration;

/// Which sections of the summary to print after the totals line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummarySections {
    pub skipped: bool,
    pub failed: bool,
    pub errors: bool,
}

impl Default for SummarySections {
    fn default() -> Self {
        SummarySections {
            skipped: true,
            failed: true,
            errors: true,
        }
    }
}

impl SummarySections {
    /// Only the totals line.
    pub fn none() -> Self {
        SummarySections {
            skipped: false,
            failed: false,
            errors: false,
        }
    }
}

fn count_suffix(count: usize, singular: &str, plural: &str) -> String {
    match count {
        0 => String::new(),
        1 => format!(", 1 {}", singular),
        n => format!(", {} {}", n, plural),
    }
}

fn format_seconds(d: Duration, precision: usize) -> String {
    format!("{:.*}s", precision, d.as_secs_f64())
}

/// Lines emitted by the test framework itself when tests start or resume.
fn is_framework_line(line: &str) -> bool {
    ["=== RUN", "=== PAUSE", "=== CONT", "=== NAME"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

/// Write the summary of `execution` to `out`.
pub fn write_summary<W: Write>(
    out: &mut W,
    execution: &Execution,
    sections: SummarySections,
    opts: &FormatOptions,
) -> Result<()> {
    let skipped = execution.skipped();
    let failed = execution.failed();
    let errors = execution.errors();

    writeln!(
        out,
        "\nDONE {} tests{}{}{} in {}",
        execution.total(),
        count_suffix(skipped.len(), "skipped", "skipped"),
        count_suffix(failed.len(), "failure", "failures"),
        count_suffix(errors.len(), "error", "errors"),
        format_seconds(execution.elapsed(), 3)
    )?;

    if sections.skipped && !skipped.is_empty() {
        writeln!(out, "\n=== Skipped")?;
        for tc in &skipped {
            write_test_case(out, execution, tc, "SKIP", opts)?;
        }
    }
    if sections.failed && !failed.is_empty() {
        writeln!(out, "\n=== Failed")?;
        for tc in &failed {
            write_test_case(out, execution, tc, "FAIL", opts)?;
        }
    }
    if sections.errors && !errors.is_empty() {
        writeln!(out, "\n=== Errors")?;
        for line in errors {
            writeln!(out, "{}", line)?;
        }
    }
    Ok(())
}

fn write_test_case<W: Write>(
    out: &mut W,
    execution: &Execution,
    tc: &TestCase,
    label: &str,
    opts: &FormatOptions,
) -> Result<()> {
    writeln!(
        out,
        "=== {}: {} {} ({})",
        label,
        opts.relative_package_path(&tc.package),
        tc.test,
        format_seconds(tc.elapsed, 2)
    )?;
    if let Some(pkg) = execution.package(&tc.package) {
        let lines = if tc.test.as_str().is_empty() {
            pkg.package_output()
        } else {
            pkg.output_lines(tc)
        };
        for line in lines.iter().filter(|l| !is_framework_line(l)) {
            out.write_all(line.as_bytes())?;
        }
    }
    writeln!(out)?;
    Ok(())
}
