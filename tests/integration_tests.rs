//! Integration tests for full workflows
//!
//! These tests drive the public API and the commands with recorded event
//! streams, the way the binary does.

use pretty_assertions::assert_eq;
use std::fs;
use std::io::Read;
use std::time::Duration;
use tempfile::TempDir;
use testjson::commands::{Command, FormatCommand, MetricsCommand, SlowestCommand};
use testjson::config::{Config, ConfigFile};
use testjson::execution::{Execution, TestCase};
use testjson::format::{DotFormatter, FormatKind, FormatOptions};
use testjson::metrics::{build_execution, metrics_from_exec, FileArtifacts, MetricConfig};
use testjson::rerun::{rerun_failed, RerunConfig, TestRunner};
use testjson::scan::{merge_streams, scan_reader, scan_test_output, ScanConfig};
use testjson::ui::UI;

/// Simple test UI that captures output for assertions
struct TestUI {
    output: Vec<String>,
    errors: Vec<String>,
    bytes: Vec<u8>,
}

impl TestUI {
    fn new() -> Self {
        TestUI {
            output: Vec::new(),
            errors: Vec::new(),
            bytes: Vec::new(),
        }
    }
}

impl UI for TestUI {
    fn output(&mut self, message: &str) -> testjson::error::Result<()> {
        self.output.push(message.to_string());
        Ok(())
    }

    fn error(&mut self, message: &str) -> testjson::error::Result<()> {
        self.errors.push(message.to_string());
        Ok(())
    }

    fn warning(&mut self, message: &str) -> testjson::error::Result<()> {
        self.errors.push(format!("Warning: {}", message));
        Ok(())
    }

    fn output_bytes(&mut self, bytes: &[u8]) -> testjson::error::Result<()> {
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }
}

const END_TO_END: &str = r#"{"Time":"2021-05-01T10:00:00Z","Action":"run","Package":"example.com/app","Test":"TestA"}
{"Time":"2021-05-01T10:00:00.001Z","Action":"output","Package":"example.com/app","Test":"TestA","Output":"=== RUN   TestA\n"}
{"Time":"2021-05-01T10:00:00.005Z","Action":"pass","Package":"example.com/app","Test":"TestA","Elapsed":0.005}
{"Time":"2021-05-01T10:00:00.005Z","Action":"run","Package":"example.com/app","Test":"TestB"}
{"Time":"2021-05-01T10:00:00.006Z","Action":"output","Package":"example.com/app","Test":"TestB","Output":"    app_test.go:20: expected 1, got 2\n"}
{"Time":"2021-05-01T10:00:00.008Z","Action":"fail","Package":"example.com/app","Test":"TestB","Elapsed":0.003}
{"Time":"2021-05-01T10:00:00.009Z","Action":"output","Package":"example.com/app","Output":"FAIL\n"}
{"Time":"2021-05-01T10:00:00.009Z","Action":"output","Package":"example.com/app","Output":"coverage: 80.0% of statements\n"}
{"Time":"2021-05-01T10:00:00.010Z","Action":"fail","Package":"example.com/app","Elapsed":0.01}
"#;

#[test]
fn test_end_to_end_execution() {
    let exec = scan_reader(END_TO_END.as_bytes()).unwrap();
    let pkg = exec.package("example.com/app").unwrap();

    let names = |cases: &[TestCase]| -> Vec<String> {
        cases.iter().map(|tc| tc.test.to_string()).collect()
    };
    assert_eq!(names(&pkg.passed), vec!["TestA"]);
    assert_eq!(names(&pkg.failed), vec!["TestB"]);
    assert!(pkg.skipped.is_empty());
    assert_eq!(pkg.coverage(), "coverage: 80.0% of statements");
    assert_eq!(exec.total(), 2);
    assert_eq!(pkg.total, pkg.passed.len() + pkg.failed.len() + pkg.skipped.len());
    assert!(pkg.running().is_empty());
    assert_eq!(
        pkg.output_lines(&pkg.failed[0]),
        ["    app_test.go:20: expected 1, got 2\n"]
    );
}

#[test]
fn test_interleaved_packages() {
    let stream = r#"{"Action":"run","Package":"a","Test":"TestA1"}
{"Action":"run","Package":"b","Test":"TestB1"}
{"Action":"output","Package":"b","Test":"TestB1","Output":"from b\n"}
{"Action":"output","Package":"a","Test":"TestA1","Output":"from a\n"}
{"Action":"run","Package":"a","Test":"TestA1/sub"}
{"Action":"fail","Package":"a","Test":"TestA1/sub","Elapsed":0.5}
{"Action":"pass","Package":"b","Test":"TestB1","Elapsed":0.25}
{"Action":"fail","Package":"a","Test":"TestA1","Elapsed":0.5}
{"Action":"pass","Package":"b","Elapsed":0.25}
{"Action":"fail","Package":"a","Elapsed":0.5}
"#;
    let exec = scan_reader(stream.as_bytes()).unwrap();
    assert_eq!(exec.packages(), ["a", "b"]);

    let a = exec.package("a").unwrap();
    assert_eq!(a.total, 2);
    assert_eq!(a.failed.len(), 2);
    let parent = a.failed.iter().find(|tc| tc.test.as_str() == "TestA1").unwrap();
    assert_eq!(a.output_lines(parent), ["from a\n"]);

    let b = exec.package("b").unwrap();
    assert_eq!(b.output_lines(&b.passed[0]), ["from b\n"]);
}

#[test]
fn test_replay_is_deterministic() {
    let first = scan_reader(END_TO_END.as_bytes()).unwrap();
    let second = scan_reader(END_TO_END.as_bytes()).unwrap();
    assert_eq!(first.total(), second.total());
    assert_eq!(first.failed(), second.failed());
    assert_eq!(first.skipped(), second.skipped());
}

#[test]
fn test_dots_width_policy_through_scan() {
    let mut stream = String::new();
    for i in 0..10 {
        stream.push_str(&format!(
            "{{\"Action\":\"pass\",\"Package\":\"pkg\",\"Test\":\"Test{}\"}}\n",
            i
        ));
    }
    // Prefix width is len("pkg") + 8 = 11, so 8 glyphs fit in 20 columns.
    let mut formatter = DotFormatter::new(Vec::new(), std::io::sink(), 20, FormatOptions::default());
    let mut exec = Execution::new();
    scan_test_output(
        &mut exec,
        ScanConfig::new(stream.as_bytes()).with_handler(&mut formatter),
    )
    .unwrap();

    let line = formatter.line("pkg").unwrap();
    assert!(line.is_full());
    assert_eq!(line.glyphs(), 8);
    assert!(line.as_str().ends_with('↲'));
}

#[test]
fn test_format_command_dots_fallback() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("events.json");
    fs::write(&path, END_TO_END).unwrap();

    let config = Config {
        package_prefix: Some("example.com".to_string()),
        terminal_width: None,
        ..Default::default()
    };
    let cmd = FormatCommand::new(config)
        .with_jsonfile(Some(path.to_string_lossy().to_string()))
        .with_format(FormatKind::Dots)
        .with_summary(false);

    let mut ui = TestUI::new();
    assert_eq!(cmd.execute(&mut ui).unwrap(), 1);
    assert_eq!(String::from_utf8(ui.bytes).unwrap(), "[app]·✖");
}

#[test]
fn test_config_file_drives_commands() {
    let temp = TempDir::new().unwrap();
    let conf = temp.path().join(".testjson.conf");
    fs::write(
        &conf,
        "[DEFAULT]\nformat=testname\npackage_prefix=example.com\nmax_failures=0\n",
    )
    .unwrap();
    let events = temp.path().join("events.json");
    fs::write(&events, END_TO_END).unwrap();

    let config = Config::resolve(ConfigFile::load_from_file(&conf).unwrap(), |_| None);
    assert_eq!(config.format, FormatKind::TestName);

    let mut ui = TestUI::new();
    let cmd = FormatCommand::new(config.clone())
        .with_jsonfile(Some(events.to_string_lossy().to_string()))
        .with_summary(false);
    assert_eq!(cmd.execute(&mut ui).unwrap(), 1);
    assert_eq!(
        String::from_utf8(ui.bytes).unwrap(),
        "PASS app.TestA (0.01s)\nFAIL app.TestB (0.00s)\n"
    );

    let mut ui = TestUI::new();
    let cmd = MetricsCommand::new([events.to_string_lossy().to_string()], config);
    assert_eq!(cmd.execute(&mut ui).unwrap(), 1);
    assert_eq!(ui.errors, vec!["failures (1) exceeded threshold (0)"]);
}

#[test]
fn test_multi_file_metrics() {
    let temp = TempDir::new().unwrap();
    for (i, elapsed) in ["1.5", "3", "2"].iter().enumerate() {
        fs::write(
            temp.path().join(format!("run-{}.json", i)),
            format!(
                "{{\"Action\":\"pass\",\"Package\":\"p\",\"Test\":\"TestSlow\",\"Elapsed\":{}}}\n\
                 {{\"Action\":\"pass\",\"Package\":\"p\",\"Test\":\"TestFast\",\"Elapsed\":0.125}}\n",
                elapsed
            ),
        )
        .unwrap();
    }
    let pattern = temp.path().join("run-*.json").to_string_lossy().to_string();

    let exec = build_execution(&mut FileArtifacts::new([pattern])).unwrap();
    assert_eq!(exec.total(), 6);

    let metrics = metrics_from_exec(&MetricConfig::default(), &exec).unwrap();
    assert_eq!(metrics.slowest.len(), 1);
    assert_eq!(metrics.slowest[0].test.as_str(), "TestSlow");
    assert_eq!(metrics.slowest[0].elapsed, Duration::from_secs(2));
    assert!(metrics.failed.is_empty());
}

#[test]
fn test_slowest_command_threshold() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("events.json");
    fs::write(&path, END_TO_END).unwrap();

    let mut ui = TestUI::new();
    let cmd = SlowestCommand::with_threshold(
        Some(path.to_string_lossy().to_string()),
        Duration::from_millis(4),
    );
    assert_eq!(cmd.execute(&mut ui).unwrap(), 0);
    assert_eq!(ui.output, vec!["example.com/app TestA 5ms"]);
}

/// Hands out canned streams, one per rerun.
struct CannedRunner {
    streams: Vec<&'static str>,
    requested: Vec<String>,
}

impl TestRunner for CannedRunner {
    fn rerun(&mut self, tests: &[TestCase]) -> testjson::Result<Box<dyn Read>> {
        self.requested
            .extend(tests.iter().map(|tc| tc.test.to_string()));
        let stream = self.streams.remove(0);
        Ok(Box::new(stream.as_bytes()))
    }
}

#[test]
fn test_rerun_scenario() {
    let initial = r#"{"Action":"run","Package":"p","Test":"TestX"}
{"Action":"fail","Package":"p","Test":"TestX","Elapsed":0.25}
{"Action":"pass","Package":"p","Test":"TestY","Elapsed":0.25}
{"Action":"fail","Package":"p","Elapsed":0.5}
"#;
    let rerun = r#"{"Action":"run","Package":"p","Test":"TestX"}
{"Action":"pass","Package":"p","Test":"TestX","Elapsed":0.25}
{"Action":"pass","Package":"p","Elapsed":0.25}
"#;
    let mut runner = CannedRunner {
        streams: vec![rerun],
        requested: Vec::new(),
    };
    let report = rerun_failed(
        Box::new(initial.as_bytes()),
        &mut runner,
        None,
        &RerunConfig {
            max_attempts: 2,
            max_failures: 10,
        },
    )
    .unwrap();

    assert_eq!(report.iterations, 2);
    assert_eq!(runner.requested, vec!["TestX"]);
    assert!(report.last.failed().is_empty());
}

#[test]
fn test_merge_streams_carries_execution_forward() {
    let mut exec = Execution::new();
    merge_streams(
        &mut exec,
        [
            r#"{"Action":"fail","Package":"p","Test":"TestX","Elapsed":0.25}"#.as_bytes(),
            r#"{"Action":"pass","Package":"p","Test":"TestX","Elapsed":0.5}"#.as_bytes(),
        ],
    )
    .unwrap();

    let pkg = exec.package("p").unwrap();
    assert_eq!(pkg.total, 2);
    assert_eq!(pkg.failed.len(), 1);
    assert_eq!(pkg.passed.len(), 1);
}
