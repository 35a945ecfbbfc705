//! Metrics gathered from one or more test runs
//!
//! Runs are read from an [`ArtifactSource`], merged into a single
//! [`Execution`], reduced to [`Metrics`], and handed to a [`MetricsEmitter`].
//! Nothing in this module knows about remote metric stores.

use crate::error::{Error, Result};
use crate::execution::{Execution, TestCase};
use crate::scan::merge_streams;
use crate::slowest::test_cases_from_exec;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

/// Limits applied when building [`Metrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricConfig {
    /// A run with more failures than this is considered broken and yields no
    /// metrics at all.
    pub max_failures_threshold: usize,
    /// Tests faster than this are left out of the slowest list.
    pub slow_test_threshold: Duration,
    pub max_slow_tests: usize,
}

impl Default for MetricConfig {
    fn default() -> Self {
        MetricConfig {
            max_failures_threshold: 10,
            slow_test_threshold: Duration::from_secs(1),
            max_slow_tests: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Metrics {
    pub slowest: Vec<TestCase>,
    pub failed: Vec<TestCase>,
    pub tags: BTreeMap<String, String>,
}

impl Metrics {
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Reduce an execution to metrics.
pub fn metrics_from_exec(cfg: &MetricConfig, exec: &Execution) -> Result<Metrics> {
    let failed = exec.failed();
    if failed.len() > cfg.max_failures_threshold {
        return Err(Error::TooManyFailures {
            failed: failed.len(),
            threshold: cfg.max_failures_threshold,
        });
    }

    let mut slowest = test_cases_from_exec(exec, cfg.slow_test_threshold);
    slowest.truncate(cfg.max_slow_tests);
    Ok(Metrics {
        slowest,
        failed,
        tags: BTreeMap::new(),
    })
}

/// Destination for metrics.
pub trait MetricsEmitter {
    fn emit(&mut self, metrics: &Metrics) -> Result<()>;
}

/// Writes metrics as a pretty printed JSON document.
pub struct JsonEmitter<W: Write> {
    out: W,
}

impl<W: Write> JsonEmitter<W> {
    pub fn new(out: W) -> Self {
        JsonEmitter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MetricsEmitter for JsonEmitter<W> {
    fn emit(&mut self, metrics: &Metrics) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, metrics)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Supplies the recorded event streams of earlier runs.
pub trait ArtifactSource {
    fn streams(&mut self) -> Result<Vec<Box<dyn Read>>>;
}

/// Local files matched by glob patterns.
pub struct FileArtifacts {
    patterns: Vec<String>,
}

impl FileArtifacts {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FileArtifacts {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Every matching path, in pattern order, each path at most once.
    pub fn paths(&self) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for pattern in &self.patterns {
            let entries = glob::glob(pattern)
                .map_err(|e| Error::Config(format!("invalid pattern {:?}: {}", pattern, e)))?;
            for entry in entries {
                let path = entry.map_err(|e| Error::Io(e.into_error()))?;
                if seen.insert(path.clone()) {
                    paths.push(path);
                }
            }
        }
        Ok(paths)
    }
}

impl ArtifactSource for FileArtifacts {
    fn streams(&mut self) -> Result<Vec<Box<dyn Read>>> {
        let paths = self.paths()?;
        let mut streams: Vec<Box<dyn Read>> = Vec::with_capacity(paths.len());
        for path in paths {
            debug!("Reading test events from {}", path.display());
            streams.push(Box::new(File::open(&path)?));
        }
        Ok(streams)
    }
}

/// Merge every stream of `source` into one execution.
pub fn build_execution(source: &mut dyn ArtifactSource) -> Result<Execution> {
    let mut exec = Execution::new();
    merge_streams(&mut exec, source.streams()?)?;
    Ok(exec)
}

/// Build metrics from `source` and hand them to `emitter`.
pub fn export_metrics(
    source: &mut dyn ArtifactSource,
    cfg: &MetricConfig,
    tags: &BTreeMap<String, String>,
    emitter: &mut dyn MetricsEmitter,
) -> Result<Metrics> {
    let exec = build_execution(source)?;
    let metrics = metrics_from_exec(cfg, &exec)?.with_tags(tags.clone());
    emitter.emit(&metrics)?;
    Ok(metrics)
}
