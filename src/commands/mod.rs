//! Command system for testjson
//!
//! Commands are discovered and executed through the Command trait.

use crate::error::Result;
use crate::ui::UI;

pub mod format;
pub mod metrics;
pub mod rerun_fails;
pub mod slowest;
mod utils;

pub use format::FormatCommand;
pub use metrics::MetricsCommand;
pub use rerun_fails::{RerunFailsCommand, ShellTestRunner};
pub use slowest::SlowestCommand;

/// Trait that all commands must implement
pub trait Command {
    /// Execute the command, returning the process exit code
    fn execute(&self, ui: &mut dyn UI) -> Result<i32>;

    /// Get the command name
    fn name(&self) -> &str;

    /// Get command help text
    fn help(&self) -> &str;
}
