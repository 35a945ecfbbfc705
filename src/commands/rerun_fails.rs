//! Rerun the failed tests of a recorded run

use crate::commands::utils::{open_jsonfile, shell_quote};
use crate::commands::Command;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::execution::TestCase;
use crate::format::new_formatter;
use crate::rerun::{go_test_run_pattern, rerun_failed, TestRunner};
use crate::ui::{UiWriter, UI};
use log::{debug, warn};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::{Command as Process, Stdio};

/// Reruns tests through the configured shell command, one test at a time.
pub struct ShellTestRunner<'a> {
    config: &'a Config,
    dir: Option<PathBuf>,
}

impl<'a> ShellTestRunner<'a> {
    pub fn new(config: &'a Config) -> Self {
        ShellTestRunner { config, dir: None }
    }

    /// Run the command in `dir` instead of the working directory.
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// The shell command that reruns `tc`.
    pub fn command_for(&self, tc: &TestCase) -> String {
        self.config.rerun_command_for(
            &shell_quote(&tc.package),
            &shell_quote(&go_test_run_pattern(tc.test.as_str())),
        )
    }
}

impl TestRunner for ShellTestRunner<'_> {
    fn rerun(&mut self, tests: &[TestCase]) -> Result<Box<dyn Read>> {
        let mut events = Vec::new();
        for tc in tests {
            let cmd_str = self.command_for(tc);
            debug!("Running: {}", cmd_str);

            let mut cmd = Process::new("sh");
            cmd.arg("-c")
                .arg(&cmd_str)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            if let Some(dir) = &self.dir {
                cmd.current_dir(dir);
            }
            let output = cmd.output().map_err(|e| {
                Error::CommandExecution(format!("Failed to execute rerun command: {}", e))
            })?;

            // A non-zero status only means that tests failed, which the
            // events already report.
            if !output.stderr.is_empty() {
                warn!(
                    "{} wrote to stderr: {}",
                    cmd_str,
                    String::from_utf8_lossy(&output.stderr).trim_end()
                );
            }
            events.extend_from_slice(&output.stdout);
        }
        Ok(Box::new(Cursor::new(events)))
    }
}

pub struct RerunFailsCommand {
    jsonfile: Option<String>,
    max_attempts: Option<usize>,
    config: Config,
}

impl RerunFailsCommand {
    pub fn new(config: Config) -> Self {
        RerunFailsCommand {
            jsonfile: None,
            max_attempts: None,
            config,
        }
    }

    pub fn with_jsonfile(mut self, path: Option<String>) -> Self {
        self.jsonfile = path;
        self
    }

    /// Override the configured number of reruns.
    pub fn with_max_attempts(mut self, max_attempts: Option<usize>) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl Command for RerunFailsCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        let initial = open_jsonfile(self.jsonfile.as_deref())?;
        let mut cfg = self.config.rerun.clone();
        if let Some(max_attempts) = self.max_attempts {
            cfg.max_attempts = max_attempts;
        }
        let mut runner = ShellTestRunner::new(&self.config);

        let result = {
            let mut formatter = new_formatter(
                self.config.format,
                UiWriter::new(ui),
                io::stderr(),
                &self.config,
            );
            rerun_failed(initial, &mut runner, Some(formatter.as_mut()), &cfg)
        };

        match result {
            Ok(report) if report.attempts == 0 => {
                ui.output("No failed tests to rerun")?;
                Ok(0)
            }
            Ok(report) => {
                ui.output(&format!(
                    "All failed tests passed after {} rerun(s)",
                    report.attempts
                ))?;
                Ok(0)
            }
            Err(
                err @ (Error::PersistentFailures { .. }
                | Error::TooManyFailures { .. }
                | Error::PackageFailure(_)),
            ) => {
                ui.error(&err.to_string())?;
                Ok(1)
            }
            Err(err) => Err(err),
        }
    }

    fn name(&self) -> &str {
        "rerun-fails"
    }

    fn help(&self) -> &str {
        "Rerun the failed tests of a run until they pass"
    }
}
