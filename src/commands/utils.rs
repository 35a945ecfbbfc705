//! Utility functions for command implementation

use crate::error::Result;
use std::fs::File;
use std::io::{self, Read};

/// Open a file of test events, or stdin when `path` is absent or `-`.
pub fn open_jsonfile(path: Option<&str>) -> Result<Box<dyn Read>> {
    match path {
        None | Some("") | Some("-") => Ok(Box::new(io::stdin())),
        Some(path) => {
            let file = File::open(path).map_err(|e| {
                io::Error::new(e.kind(), format!("failed to open {}: {}", path, e))
            })?;
            Ok(Box::new(file))
        }
    }
}

/// Quote `s` for use as a single word in a `sh -c` command line.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
