//! testjson - Command-line tool for go test -json event streams

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use testjson::commands::*;
use testjson::config::Config;
use testjson::format::FormatKind;
use testjson::ui::{CliUI, UI};

#[derive(Parser)]
#[command(name = "testjson")]
#[command(about = "Format, rank and rerun go test -json output", long_about = None)]
struct Cli {
    /// Configuration file (defaults to .testjson.conf when present)
    #[arg(long, global = true, env = "TESTJSON_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a stream of test events
    Format {
        /// File of test events (defaults to stdin)
        #[arg(long)]
        jsonfile: Option<String>,

        /// File of diagnostics written to stderr by go test
        #[arg(long)]
        stderr_file: Option<String>,

        /// Output format: dots, pkgname, testname, standard-quiet, standard-verbose
        #[arg(long)]
        format: Option<FormatKind>,

        /// Do not print the summary after the run
        #[arg(long)]
        no_summary: bool,

        /// Treat lines that are not test events as errors instead of failing
        #[arg(long)]
        ignore_non_json_output_lines: bool,
    },

    /// Show the slowest tests
    Slowest {
        /// File of test events (defaults to stdin)
        #[arg(long)]
        jsonfile: Option<String>,

        /// Only show tests slower than this
        #[arg(long, default_value = "100")]
        threshold_ms: u64,
    },

    /// Merge recorded runs and export metrics as JSON
    Metrics {
        /// Glob pattern of files of test events (may be repeated)
        #[arg(long = "jsonfile", required = true)]
        jsonfiles: Vec<String>,

        /// Write the metrics to this file instead of stdout
        #[arg(long)]
        output: Option<String>,
    },

    /// Rerun failed tests until they pass
    #[command(name = "rerun-fails")]
    RerunFails {
        /// File of test events (defaults to stdin)
        #[arg(long)]
        jsonfile: Option<String>,

        /// Number of reruns before giving up
        #[arg(long)]
        max_attempts: Option<usize>,
    },
}

fn setup_logging(debug: bool) -> anyhow::Result<()> {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}: {}", record.level(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .context("failed to initialise logging")?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.debug) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    let mut ui = CliUI::new();

    let config = match Config::from_env(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let _ = ui.error(&e.to_string());
            std::process::exit(1);
        }
    };

    let cmd: Box<dyn Command> = match cli.command {
        Commands::Format {
            jsonfile,
            stderr_file,
            format,
            no_summary,
            ignore_non_json_output_lines,
        } => {
            let mut cmd = FormatCommand::new(config)
                .with_jsonfile(jsonfile)
                .with_stderr_file(stderr_file)
                .with_summary(!no_summary)
                .ignore_non_json_output_lines(ignore_non_json_output_lines);
            if let Some(format) = format {
                cmd = cmd.with_format(format);
            }
            Box::new(cmd)
        }
        Commands::Slowest {
            jsonfile,
            threshold_ms,
        } => Box::new(SlowestCommand::with_threshold(
            jsonfile,
            Duration::from_millis(threshold_ms),
        )),
        Commands::Metrics { jsonfiles, output } => {
            Box::new(MetricsCommand::new(jsonfiles, config).with_output(output))
        }
        Commands::RerunFails {
            jsonfile,
            max_attempts,
        } => Box::new(
            RerunFailsCommand::new(config)
                .with_jsonfile(jsonfile)
                .with_max_attempts(max_attempts),
        ),
    };

    log::debug!("Running {}", cmd.name());
    match cmd.execute(&mut ui) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            let _ = ui.error(&e.to_string());
            std::process::exit(1);
        }
    }
}
