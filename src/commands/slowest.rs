//! Show the slowest tests

use crate::commands::utils::open_jsonfile;
use crate::commands::Command;
use crate::error::Result;
use crate::scan::scan_reader;
use crate::slowest::test_cases_from_exec;
use crate::ui::UI;
use std::time::Duration;

pub struct SlowestCommand {
    jsonfile: Option<String>,
    threshold: Duration,
}

impl SlowestCommand {
    pub fn new(jsonfile: Option<String>) -> Self {
        SlowestCommand {
            jsonfile,
            threshold: Duration::from_millis(100),
        }
    }

    pub fn with_threshold(jsonfile: Option<String>, threshold: Duration) -> Self {
        SlowestCommand {
            jsonfile,
            threshold,
        }
    }
}

impl Command for SlowestCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        let exec = scan_reader(open_jsonfile(self.jsonfile.as_deref())?)?;

        for tc in test_cases_from_exec(&exec, self.threshold) {
            ui.output(&format!("{} {} {:?}", tc.package, tc.test, tc.elapsed))?;
        }

        Ok(0)
    }

    fn name(&self) -> &str {
        "slowest"
    }

    fn help(&self) -> &str {
        "Show the tests slower than a threshold, slowest first"
    }
}
