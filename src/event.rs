//! Test events as emitted by `go test -json`
//!
//! Every line of the stream is one independently decodable record. Package
//! level events carry an empty `Test` field.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

/// The action reported by a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Emitted by newer toolchains once per package, before any test runs.
    Start,
    Run,
    Pause,
    Cont,
    Pass,
    Fail,
    Skip,
    Output,
    Bench,
}

impl Action {
    /// Returns true for the actions that end a test or a package.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Pass | Action::Fail | Action::Skip)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Start => "start",
            Action::Run => "run",
            Action::Pause => "pause",
            Action::Cont => "cont",
            Action::Pass => "pass",
            Action::Fail => "fail",
            Action::Skip => "skip",
            Action::Output => "output",
            Action::Bench => "bench",
        };
        f.write_str(s)
    }
}

/// One decoded record from the event stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestEvent {
    /// When the event was emitted. Unset or unparseable values decode to `None`.
    #[serde(default, deserialize_with = "lenient_time")]
    pub time: Option<DateTime<Utc>>,
    pub action: Action,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub test: String,
    #[serde(default)]
    pub output: String,
    /// Elapsed seconds, only present on terminal actions.
    #[serde(default)]
    pub elapsed: Option<f64>,
}

impl TestEvent {
    /// Returns true if the event applies to the package rather than a test.
    pub fn package_event(&self) -> bool {
        self.test.is_empty()
    }

    /// The elapsed time reported by the event itself. Negative values and
    /// values too large for a `Duration` clamp to zero.
    pub fn elapsed_duration(&self) -> Duration {
        match self.elapsed {
            Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }
}

fn lenient_time<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc)))
}

/// Decode a single line of the event stream.
pub fn parse_event(line: &[u8]) -> Result<TestEvent> {
    serde_json::from_slice(line).map_err(|source| Error::MalformedEvent {
        line: String::from_utf8_lossy(line).trim_end().to_string(),
        source,
    })
}

/// Name of a test, with `/` separating subtest segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TestName(String);

impl TestName {
    pub fn new(name: impl Into<String>) -> Self {
        TestName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `other` is nested somewhere below this test.
    pub fn is_parent_of(&self, other: &TestName) -> bool {
        other
            .0
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestName {
    fn from(s: &str) -> Self {
        TestName(s.to_string())
    }
}

impl From<String> for TestName {
    fn from(s: String) -> Self {
        TestName(s)
    }
}
