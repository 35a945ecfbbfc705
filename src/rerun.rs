//! Rerunning failed tests until they pass
//!
//! Each iteration scans one event stream. When it reports failures, only the
//! failed tests are run again through a [`TestRunner`] and the resulting
//! stream becomes the next iteration. The number of reruns is bounded.

use crate::error::{Error, Result};
use crate::execution::{Execution, TestCase};
use crate::scan::{scan_test_output, EventHandler, ScanConfig};
use log::debug;
use std::io::Read;

/// Bounds for the rerun loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RerunConfig {
    /// Reruns allowed before giving up.
    pub max_attempts: usize,
    /// More failures than this are not rerun at all.
    pub max_failures: usize,
}

impl Default for RerunConfig {
    fn default() -> Self {
        RerunConfig {
            max_attempts: 2,
            max_failures: 20,
        }
    }
}

/// Runs a set of tests and returns their event stream.
pub trait TestRunner {
    fn rerun(&mut self, tests: &[TestCase]) -> Result<Box<dyn Read>>;
}

/// Outcome of a successful rerun loop.
#[derive(Debug)]
pub struct RerunReport {
    /// Number of streams scanned, including the initial one.
    pub iterations: usize,
    /// Number of times the runner was invoked.
    pub attempts: usize,
    /// The execution built from the last stream.
    pub last: Execution,
}

/// Scan `initial`, then rerun failed tests through `runner` until none fail
/// or `cfg.max_attempts` reruns have been made.
pub fn rerun_failed(
    initial: Box<dyn Read>,
    runner: &mut dyn TestRunner,
    mut handler: Option<&mut dyn EventHandler>,
    cfg: &RerunConfig,
) -> Result<RerunReport> {
    let mut stream = initial;
    let mut attempts = 0;
    let mut iterations = 0;

    loop {
        let mut exec = Execution::new();
        let mut scan = ScanConfig::new(stream);
        if let Some(handler) = handler.as_mut() {
            scan = scan.with_handler(&mut **handler);
        }
        scan_test_output(&mut exec, scan)?;
        iterations += 1;

        let failed = exec.failed();
        if failed.is_empty() {
            return Ok(RerunReport {
                iterations,
                attempts,
                last: exec,
            });
        }
        if let Some(tc) = failed.iter().find(|tc| tc.test.as_str().is_empty()) {
            return Err(Error::PackageFailure(tc.package.clone()));
        }
        if failed.len() > cfg.max_failures {
            return Err(Error::TooManyFailures {
                failed: failed.len(),
                threshold: cfg.max_failures,
            });
        }
        if attempts >= cfg.max_attempts {
            return Err(Error::PersistentFailures {
                attempts,
                failing: failed
                    .iter()
                    .map(|tc| format!("{}.{}", tc.package, tc.test))
                    .collect(),
            });
        }

        let tests = tests_to_rerun(&failed);
        attempts += 1;
        debug!("Rerun attempt {}: {} test(s)", attempts, tests.len());
        stream = runner.rerun(&tests)?;
    }
}

/// The failed tests that need to run again. A parent test is dropped when one
/// of its subtests failed too, since rerunning the subtest reruns the parent.
/// Each test appears once.
pub fn tests_to_rerun(failed: &[TestCase]) -> Vec<TestCase> {
    let mut tests: Vec<TestCase> = Vec::new();
    for tc in failed {
        let is_parent = failed
            .iter()
            .any(|other| other.package == tc.package && tc.test.is_parent_of(&other.test));
        let seen = tests
            .iter()
            .any(|t| t.package == tc.package && t.test == tc.test);
        if !is_parent && !seen {
            tests.push(tc.clone());
        }
    }
    tests
}

/// A `-run` argument matching exactly the test `name`, with each subtest
/// segment anchored separately.
pub fn go_test_run_pattern(name: &str) -> String {
    name.split('/')
        .map(|segment| format!("^{}$", regex::escape(segment)))
        .collect::<Vec<_>>()
        .join("/")
}
