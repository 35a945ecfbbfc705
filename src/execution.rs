//! The execution model rebuilt from an event stream
//!
//! An [`Execution`] holds one [`Package`] per package path, in first-seen
//! order. Events are applied strictly in stream order; events from different
//! packages may interleave arbitrarily. Subtests are kept as flat
//! `Parent/Child` names.

use crate::event::{Action, TestEvent, TestName};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// Output sequence number of lines that belong to the package itself.
pub const PACKAGE_OUTPUT_ID: usize = 0;

/// One finished test instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    /// Output sequence number, unique within the package.
    #[serde(skip)]
    pub id: usize,
    pub package: String,
    pub test: TestName,
    #[serde(serialize_with = "serialize_nanos")]
    pub elapsed: Duration,
    /// When the terminal event for the test was emitted.
    pub time: Option<DateTime<Utc>>,
}

fn serialize_nanos<S: serde::Serializer>(
    elapsed: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u128(elapsed.as_nanos())
}

/// A test that has started but not reached a terminal action.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningTest {
    pub id: usize,
    pub started: Option<DateTime<Utc>>,
}

/// All the results for one package.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub total: usize,
    pub passed: Vec<TestCase>,
    pub failed: Vec<TestCase>,
    pub skipped: Vec<TestCase>,
    running: HashMap<String, RunningTest>,
    output: HashMap<usize, Vec<String>>,
    coverage: String,
    action: Option<Action>,
    cached: bool,
    elapsed: Option<Duration>,
    next_id: usize,
}

impl Package {
    fn new() -> Self {
        Package {
            next_id: PACKAGE_OUTPUT_ID + 1,
            ..Default::default()
        }
    }

    fn allocate_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The coverage summary line, or an empty string if none was reported.
    pub fn coverage(&self) -> &str {
        &self.coverage
    }

    /// The package level terminal action, if the package has finished.
    pub fn action(&self) -> Option<Action> {
        self.action
    }

    /// Returns true if the toolchain reported a cached result.
    pub fn cached(&self) -> bool {
        self.cached
    }

    /// Tests that have started but not finished, keyed by name.
    pub fn running(&self) -> &HashMap<String, RunningTest> {
        &self.running
    }

    /// The elapsed time of the package: the reported package time once it has
    /// finished, otherwise the sum of the finished tests.
    pub fn elapsed(&self) -> Duration {
        if let Some(elapsed) = self.elapsed {
            return elapsed;
        }
        self.test_cases().map(|tc| tc.elapsed).sum()
    }

    /// All finished test cases, passed first, then failed, then skipped.
    pub fn test_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.passed
            .iter()
            .chain(self.failed.iter())
            .chain(self.skipped.iter())
    }

    /// Captured output lines for a test case.
    pub fn output_lines(&self, tc: &TestCase) -> &[String] {
        self.output_for_id(tc.id)
    }

    /// Captured output lines that were not attributed to any test.
    pub fn package_output(&self) -> &[String] {
        self.output_for_id(PACKAGE_OUTPUT_ID)
    }

    fn output_for_id(&self, id: usize) -> &[String] {
        self.output.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns true if the package failed without any failed test, which
    /// happens on build failures, panics outside a test, or a failing TestMain.
    pub fn test_main_failed(&self) -> bool {
        self.action == Some(Action::Fail) && self.failed.is_empty()
    }

    /// Returns true if the package finished without running any test.
    pub fn no_tests(&self) -> bool {
        self.action.is_some() && self.total == 0 && !self.test_main_failed()
    }

    fn add_output(&mut self, id: usize, line: &str) {
        self.output.entry(id).or_default().push(line.to_string());
    }

    fn output_id_for(&self, test: &str) -> usize {
        if let Some(running) = self.running.get(test) {
            return running.id;
        }
        self.test_cases()
            .filter(|tc| tc.test.as_str() == test)
            .map(|tc| tc.id)
            .max()
            .unwrap_or(PACKAGE_OUTPUT_ID)
    }
}

fn coverage_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"coverage: \d+(\.\d+)?% of statements").expect("coverage regex is valid")
    })
}

fn is_coverage_output(output: &str) -> bool {
    coverage_pattern().is_match(output)
}

fn is_cached_output(output: &str) -> bool {
    output.trim_end().ends_with("(cached)")
}

/// The aggregate of every event scanned so far.
#[derive(Debug, Clone)]
pub struct Execution {
    started: DateTime<Utc>,
    packages: HashMap<String, Package>,
    order: Vec<String>,
    errors: Vec<String>,
}

impl Default for Execution {
    fn default() -> Self {
        Self::new()
    }
}

impl Execution {
    /// Creates an empty execution starting now.
    pub fn new() -> Self {
        Execution {
            started: Utc::now(),
            packages: HashMap::new(),
            order: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Apply one event to the model.
    pub fn apply(&mut self, event: &TestEvent) {
        let pkg = self.package_mut(&event.package);

        if event.package_event() {
            match event.action {
                Action::Pass | Action::Fail | Action::Skip => {
                    pkg.action = Some(event.action);
                    pkg.elapsed = Some(event.elapsed_duration());
                }
                Action::Output | Action::Bench => {
                    if is_coverage_output(&event.output) {
                        pkg.coverage = event.output.trim_end().to_string();
                    }
                    if is_cached_output(&event.output) {
                        pkg.cached = true;
                    }
                    pkg.add_output(PACKAGE_OUTPUT_ID, &event.output);
                }
                Action::Start | Action::Run | Action::Pause | Action::Cont => {}
            }
            return;
        }

        match event.action {
            Action::Run => {
                let id = pkg.allocate_id();
                pkg.running.insert(
                    event.test.clone(),
                    RunningTest {
                        id,
                        started: event.time,
                    },
                );
            }
            Action::Output | Action::Bench => {
                if is_coverage_output(&event.output) {
                    pkg.coverage = event.output.trim_end().to_string();
                }
                let id = match pkg.output_id_for(&event.test) {
                    // Output before any run event starts the test.
                    PACKAGE_OUTPUT_ID => {
                        let id = pkg.allocate_id();
                        pkg.running
                            .insert(event.test.clone(), RunningTest { id, started: None });
                        id
                    }
                    id => id,
                };
                pkg.add_output(id, &event.output);
            }
            Action::Pass | Action::Fail | Action::Skip => {
                let running = match pkg.running.remove(&event.test) {
                    Some(running) => running,
                    None => RunningTest {
                        id: pkg.allocate_id(),
                        started: None,
                    },
                };
                let tc = TestCase {
                    id: running.id,
                    package: event.package.clone(),
                    test: TestName::new(event.test.clone()),
                    elapsed: elapsed_for(event, running.started),
                    time: event.time,
                };
                match event.action {
                    Action::Pass => pkg.passed.push(tc),
                    Action::Fail => pkg.failed.push(tc),
                    _ => pkg.skipped.push(tc),
                }
                pkg.total += 1;
            }
            Action::Start | Action::Pause | Action::Cont => {}
        }
    }

    /// Record a free-standing error line, such as a compiler diagnostic.
    pub fn add_error(&mut self, text: impl Into<String>) {
        self.errors.push(text.into());
    }

    fn package_mut(&mut self, name: &str) -> &mut Package {
        if !self.packages.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.packages
            .entry(name.to_string())
            .or_insert_with(Package::new)
    }

    /// Look up a package by path.
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Package paths in the order they were first seen.
    pub fn packages(&self) -> &[String] {
        &self.order
    }

    fn iter_packages(&self) -> impl Iterator<Item = (&str, &Package)> {
        self.order
            .iter()
            .filter_map(|name| self.packages.get(name).map(|pkg| (name.as_str(), pkg)))
    }

    /// Total number of finished tests across all packages.
    pub fn total(&self) -> usize {
        self.packages.values().map(|pkg| pkg.total).sum()
    }

    /// All failed test cases. A package that failed without a failing test
    /// contributes one case with an empty test name.
    pub fn failed(&self) -> Vec<TestCase> {
        let mut failed = Vec::new();
        for (name, pkg) in self.iter_packages() {
            if pkg.test_main_failed() {
                failed.push(TestCase {
                    id: PACKAGE_OUTPUT_ID,
                    package: name.to_string(),
                    test: TestName::default(),
                    elapsed: pkg.elapsed(),
                    time: None,
                });
            }
            failed.extend(pkg.failed.iter().cloned());
        }
        failed
    }

    /// All skipped test cases.
    pub fn skipped(&self) -> Vec<TestCase> {
        self.iter_packages()
            .flat_map(|(_, pkg)| pkg.skipped.iter().cloned())
            .collect()
    }

    /// Free-standing error lines, in the order they were reported.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// When the execution was created.
    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    /// Wall clock time since the execution was created.
    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.started).to_std().unwrap_or(Duration::ZERO)
    }
}

fn elapsed_for(event: &TestEvent, started: Option<DateTime<Utc>>) -> Duration {
    if event.elapsed.is_some() {
        return event.elapsed_duration();
    }
    match (started, event.time) {
        (Some(start), Some(end)) => (end - start).to_std().unwrap_or(Duration::ZERO),
        _ => Duration::ZERO,
    }
}
