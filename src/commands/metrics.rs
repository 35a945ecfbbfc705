//! Export metrics from recorded runs

use crate::commands::Command;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::metrics::{export_metrics, FileArtifacts, JsonEmitter};
use crate::ui::{UiWriter, UI};
use log::debug;
use std::fs::File;

pub struct MetricsCommand {
    patterns: Vec<String>,
    output: Option<String>,
    config: Config,
}

impl MetricsCommand {
    pub fn new<I, S>(patterns: I, config: Config) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MetricsCommand {
            patterns: patterns.into_iter().map(Into::into).collect(),
            output: None,
            config,
        }
    }

    /// Write the metrics to `path` instead of stdout.
    pub fn with_output(mut self, path: Option<String>) -> Self {
        self.output = path;
        self
    }
}

impl Command for MetricsCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        let mut source = FileArtifacts::new(self.patterns.iter().cloned());
        if source.paths()?.is_empty() {
            ui.warning(&format!("no files matched {}", self.patterns.join(" ")))?;
        }

        let result = match &self.output {
            Some(path) => {
                let mut emitter = JsonEmitter::new(File::create(path)?);
                export_metrics(
                    &mut source,
                    &self.config.metrics,
                    &self.config.tags,
                    &mut emitter,
                )
            }
            None => {
                let mut emitter = JsonEmitter::new(UiWriter::new(ui));
                export_metrics(
                    &mut source,
                    &self.config.metrics,
                    &self.config.tags,
                    &mut emitter,
                )
            }
        };

        match result {
            Ok(metrics) => {
                debug!(
                    "Exported {} slow test(s) and {} failure(s)",
                    metrics.slowest.len(),
                    metrics.failed.len()
                );
                Ok(0)
            }
            Err(err @ Error::TooManyFailures { .. }) => {
                ui.error(&err.to_string())?;
                Ok(1)
            }
            Err(err) => Err(err),
        }
    }

    fn name(&self) -> &str {
        "metrics"
    }

    fn help(&self) -> &str {
        "Merge recorded runs and export slow test and failure metrics as JSON"
    }
}
