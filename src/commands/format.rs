//! Render a stream of test events

use crate::commands::utils::open_jsonfile;
use crate::commands::Command;
use crate::config::Config;
use crate::error::Result;
use crate::execution::Execution;
use crate::format::{new_formatter, FormatKind};
use crate::scan::{scan_test_output, ScanConfig};
use crate::summary::{write_summary, SummarySections};
use crate::ui::{UiWriter, UI};
use std::fs::File;
use std::io;

pub struct FormatCommand {
    jsonfile: Option<String>,
    stderr_file: Option<String>,
    format: FormatKind,
    summary: bool,
    ignore_non_json_output_lines: bool,
    config: Config,
}

impl FormatCommand {
    pub fn new(config: Config) -> Self {
        FormatCommand {
            jsonfile: None,
            stderr_file: None,
            format: config.format,
            summary: true,
            ignore_non_json_output_lines: false,
            config,
        }
    }

    /// Read events from `path` instead of stdin.
    pub fn with_jsonfile(mut self, path: Option<String>) -> Self {
        self.jsonfile = path;
        self
    }

    /// Read diagnostics from `path` after the events.
    pub fn with_stderr_file(mut self, path: Option<String>) -> Self {
        self.stderr_file = path;
        self
    }

    pub fn with_format(mut self, format: FormatKind) -> Self {
        self.format = format;
        self
    }

    pub fn with_summary(mut self, summary: bool) -> Self {
        self.summary = summary;
        self
    }

    pub fn ignore_non_json_output_lines(mut self, ignore: bool) -> Self {
        self.ignore_non_json_output_lines = ignore;
        self
    }
}

impl Command for FormatCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        let stdout = open_jsonfile(self.jsonfile.as_deref())?;
        let mut exec = Execution::new();

        {
            let mut formatter =
                new_formatter(self.format, UiWriter::new(ui), io::stderr(), &self.config);
            let mut scan = ScanConfig::new(stdout)
                .with_handler(formatter.as_mut())
                .ignore_non_json_output_lines(self.ignore_non_json_output_lines);
            if let Some(path) = &self.stderr_file {
                scan = scan.with_stderr(File::open(path)?);
            }
            scan_test_output(&mut exec, scan)?;
        }

        if self.summary {
            write_summary(
                &mut UiWriter::new(ui),
                &exec,
                SummarySections::default(),
                &self.config.format_options(),
            )?;
        }

        if exec.failed().is_empty() && exec.errors().is_empty() {
            Ok(0)
        } else {
            Ok(1)
        }
    }

    fn name(&self) -> &str {
        "format"
    }

    fn help(&self) -> &str {
        "Render a stream of go test -json events"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::test_ui::TestUI;
    use std::fs;
    use tempfile::TempDir;

    const PASSING: &str = r#"{"Action":"run","Package":"example.com/mod/pkg","Test":"TestA"}
{"Action":"pass","Package":"example.com/mod/pkg","Test":"TestA","Elapsed":0.25}
{"Action":"pass","Package":"example.com/mod/pkg","Elapsed":0.5}
"#;

    const FAILING: &str = r#"{"Action":"run","Package":"example.com/mod/pkg","Test":"TestB"}
{"Action":"output","Package":"example.com/mod/pkg","Test":"TestB","Output":"    b_test.go:3: nope\n"}
{"Action":"fail","Package":"example.com/mod/pkg","Test":"TestB","Elapsed":0.25}
{"Action":"fail","Package":"example.com/mod/pkg","Elapsed":0.5}
"#;

    fn config() -> Config {
        Config {
            package_prefix: Some("example.com/mod".to_string()),
            ..Default::default()
        }
    }

    fn write_events(temp: &TempDir, contents: &str) -> String {
        let path = temp.path().join("events.json");
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_format_passing_run() {
        let temp = TempDir::new().unwrap();
        let cmd = FormatCommand::new(config())
            .with_jsonfile(Some(write_events(&temp, PASSING)))
            .with_format(FormatKind::TestName)
            .with_summary(false);

        let mut ui = TestUI::new();
        assert_eq!(cmd.execute(&mut ui).unwrap(), 0);
        assert_eq!(ui.bytes_as_string(), "PASS pkg.TestA (0.25s)\n");
    }

    #[test]
    fn test_format_failing_run_with_summary() {
        let temp = TempDir::new().unwrap();
        let cmd = FormatCommand::new(config()).with_jsonfile(Some(write_events(&temp, FAILING)));

        let mut ui = TestUI::new();
        assert_eq!(cmd.execute(&mut ui).unwrap(), 1);

        let out = ui.bytes_as_string();
        assert!(out.starts_with("✖  pkg (0.500s)\n\nDONE 1 tests, 1 failure in "));
        assert!(out.contains("=== FAIL: pkg TestB (0.25s)\n    b_test.go:3: nope\n"));
    }

    #[test]
    fn test_format_stderr_file_counts_as_error() {
        let temp = TempDir::new().unwrap();
        let stderr = temp.path().join("stderr.txt");
        fs::write(&stderr, "pkg/broken.go:5:21: undefined: x\n").unwrap();
        let cmd = FormatCommand::new(config())
            .with_jsonfile(Some(write_events(&temp, PASSING)))
            .with_stderr_file(Some(stderr.to_string_lossy().to_string()));

        let mut ui = TestUI::new();
        assert_eq!(cmd.execute(&mut ui).unwrap(), 1);
        assert!(ui
            .bytes_as_string()
            .contains("=== Errors\npkg/broken.go:5:21: undefined: x\n"));
    }

    #[test]
    fn test_format_malformed_input() {
        let temp = TempDir::new().unwrap();
        let cmd = FormatCommand::new(config())
            .with_jsonfile(Some(write_events(&temp, "not json\n")))
            .with_summary(false);

        let mut ui = TestUI::new();
        assert!(cmd.execute(&mut ui).is_err());

        let cmd = cmd.ignore_non_json_output_lines(true);
        let mut ui = TestUI::new();
        assert_eq!(cmd.execute(&mut ui).unwrap(), 1);
    }
}
