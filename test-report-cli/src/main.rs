//! Test Report CLI Application
//!
//! Command-line front end for the test report engine. It uses the
//! test-report-core library and adds:
//! - Test runner invocation with stdout/stderr capture
//! - A progress spinner while the run is live
//! - Colorized table rendering of the result tree
//! - HTML report generation
//!
//! The aggregation logic itself lives entirely in the library; this crate
//! is invocation and presentation.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod exec;
mod render;
mod report;

use exec::{ExecOptions, Mode};

/// Test Report - run a test command and format its output
#[derive(Parser, Debug)]
#[command(name = "test-report-cli")]
#[command(about = "Run a go test command and format its output", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute the given go test command and format its output
    Exec {
        /// The test command to run (e.g. "go test ./...")
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
        command: Vec<String>,

        /// Only display failed tests
        #[arg(short = 'f', long)]
        only_fail: bool,

        /// Generate an HTML report
        #[arg(short, long)]
        report: bool,

        /// Path to save the report (default is current directory)
        #[arg(short = 'p', long, default_value = "./", value_name = "DIR")]
        report_path: PathBuf,

        /// Custom report name (e.g. "report")
        #[arg(short = 'n', long, value_name = "NAME")]
        report_name: Option<String>,

        /// Run mode
        #[arg(short, long, value_enum, default_value_t = Mode::Cli)]
        mode: Mode,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Test Report CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using core library v{}", test_report_core::VERSION);

    match args.command {
        Command::Exec {
            command,
            only_fail,
            report,
            report_path,
            report_name,
            mode,
        } => exec::run(
            command,
            &ExecOptions {
                only_fail,
                report,
                report_path,
                report_name,
                mode,
            },
        ),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
