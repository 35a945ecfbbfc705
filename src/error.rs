//! Error types for testjson

use std::io;
use thiserror::Error;

/// Result type alias for testjson operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for testjson
#[derive(Error, Debug)]
pub enum Error {
    /// A line of the event stream could not be decoded as a test event.
    #[error("failed to parse test event {line:?}: {source}")]
    MalformedEvent {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// The run had more failures than metrics are allowed to report.
    #[error("failures ({failed}) exceeded threshold ({threshold})")]
    TooManyFailures { failed: usize, threshold: usize },

    /// Tests were still failing after the last permitted rerun.
    #[error("{} test(s) still failing after {attempts} rerun(s): {}", .failing.len(), .failing.join(", "))]
    PersistentFailures {
        attempts: usize,
        failing: Vec<String>,
    },

    /// A package failed without any failing test (build failure, panic in TestMain).
    #[error("package {0} failed without a test failure, it can not be rerun")]
    PackageFailure(String),

    /// An event handler reported an error while rendering.
    #[error("handler error: {0}")]
    Handler(String),

    /// An external command could not be run.
    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    /// Configuration file error or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with custom message.
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
