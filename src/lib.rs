//! testjson - Reconstructs and reports on `go test -json` event streams
//!
//! # Overview
//!
//! The toolchain writes one JSON event per test action. testjson rebuilds
//! the run from those events into an [`execution::Execution`], renders it
//! while the stream is still being read, ranks slow tests, gates metrics on
//! failure counts, and reruns failed tests until they pass.
//!
//! # Architecture
//!
//! - [`event`]: The event record and its decoder
//! - [`execution`]: Packages and test cases rebuilt from events
//! - [`scan`]: Drives a scan and the [`scan::EventHandler`] callbacks
//! - [`format`]: Line formatters and the live dots formatter
//! - [`summary`]: The end of run summary
//! - [`slowest`]: Median based slow test ranking
//! - [`metrics`]: Failure gating, metric export, and artifact sources
//! - [`rerun`]: The bounded rerun loop
//! - [`config`]: Settings captured once at startup
//! - [`commands`]: User-facing commands (format, slowest, metrics, rerun-fails)
//! - [`ui`]: User interface abstraction for output
//! - [`error`]: Error types and Result alias
//!
//! # Example
//!
//! ```no_run
//! use testjson::scan::{scan_test_output, ScanConfig};
//! use testjson::execution::Execution;
//! use testjson::format::{FormatKind, LineFormatter, FormatOptions};
//!
//! # fn main() -> testjson::error::Result<()> {
//! let mut formatter = LineFormatter::new(
//!     FormatKind::TestName,
//!     std::io::stdout(),
//!     std::io::stderr(),
//!     FormatOptions::default(),
//! );
//! let mut exec = Execution::new();
//! scan_test_output(
//!     &mut exec,
//!     ScanConfig::new(std::io::stdin()).with_handler(&mut formatter),
//! )?;
//! println!("{} tests, {} failed", exec.total(), exec.failed().len());
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod execution;
pub mod format;
pub mod metrics;
pub mod rerun;
pub mod scan;
pub mod slowest;
pub mod summary;
pub mod ui;

pub use error::{Error, Result};
