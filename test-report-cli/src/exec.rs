//! Test runner invocation
//!
//! Spawns the underlying `go test` command with JSON output enabled, pumps
//! its stdout/stderr line streams through the core sequencer, and hands the
//! aggregated summary to the rendering and reporting collaborators.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use indicatif::ProgressBar;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use test_report_core::{Aggregator, Sequencer, Summary};

use crate::render::{self, RenderOptions};
use crate::report;

/// Run mode selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Mode {
    /// Interactive terminal: spinner and colors
    #[default]
    Cli,
    /// CI logs: no spinner, no colors, ASCII table style
    Ci,
}

/// Options for the exec subcommand
#[derive(Debug)]
pub struct ExecOptions {
    pub only_fail: bool,
    pub report: bool,
    pub report_path: PathBuf,
    pub report_name: Option<String>,
    pub mode: Mode,
}

/// Execute the test command and format its output
pub fn run(command: Vec<String>, opts: &ExecOptions) -> Result<()> {
    let args = parse_arguments(command);
    let args = ensure_flags(args, &["--json", "-v", "--cover"]);

    if !args.join(" ").contains("go test") {
        bail!("exec only supports go test commands");
    }

    if opts.mode == Mode::Ci {
        colored::control::set_override(false);
    }

    log::info!("running: {}", args.join(" "));
    let mut child = Command::new(&args[0])
        .args(&args[1..])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("error starting command: {}", args.join(" ")))?;

    let stdout = child.stdout.take().context("error getting stdout pipe")?;
    let stderr = child.stderr.take().context("error getting stderr pipe")?;

    // Drain stderr on its own thread so neither pipe can fill up and stall
    // the child while we read the other one.
    let stderr_reader = std::thread::spawn(move || -> Vec<String> {
        BufReader::new(stderr)
            .lines()
            .map_while(|line| line.ok())
            .collect()
    });

    let spinner = start_loader(opts.mode);

    let mut sequencer = Sequencer::new();
    for line in BufReader::new(stdout).lines() {
        sequencer.push_line(&line?);
    }
    for line in stderr_reader.join().unwrap_or_default() {
        sequencer.push_line(&line);
    }

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    // A build failure surfaces here, carrying the runner's plain-text
    // diagnostics; nothing is rendered in that case.
    let events = sequencer.finish()?;

    let mut aggregator = Aggregator::new();
    aggregator.extend(events);
    let summary = aggregator.into_summary();

    let mut render_opts = RenderOptions::new().with_ci_mode(opts.mode == Mode::Ci);
    if opts.only_fail {
        if summary.total_failed > 0 {
            render_opts = render_opts.with_only_fail(true);
        } else {
            if opts.report {
                report::generate_and_save(
                    &summary,
                    &opts.report_path,
                    opts.report_name.as_deref(),
                )?;
            }
            println!("{}", "All tests passed!".green());
            print_totals(&summary, true);
            let _ = child.wait();
            return Ok(());
        }
    }

    render::render_table(&summary, &render_opts);

    if opts.report {
        report::generate_and_save(&summary, &opts.report_path, opts.report_name.as_deref())?;
    }

    let status = child.wait().context("error waiting for command")?;
    if !status.success() {
        print_totals(&summary, false);
        bail!("tests failed: {}", status);
    }

    print_totals(&summary, true);
    println!("{}", "All tests passed!".green());
    Ok(())
}

/// Print the totals line, green on success and red on failure
fn print_totals(summary: &Summary, passed: bool) {
    let totals = format!(
        "{} tests total, {} tests passed, {} tests failed",
        summary.total_packages, summary.total_passed, summary.total_failed
    );
    if passed {
        println!("{}", totals.green());
    } else {
        println!("{}", totals.red());
    }
}

/// Display a spinner while the tests are running
fn start_loader(mode: Mode) -> Option<ProgressBar> {
    match mode {
        Mode::Ci => {
            println!("Running tests...");
            None
        }
        Mode::Cli => {
            let spinner = ProgressBar::new_spinner();
            spinner.set_message("Running tests...");
            spinner.enable_steady_tick(Duration::from_millis(100));
            Some(spinner)
        }
    }
}

/// Split a quoted command line into its arguments
///
/// A first argument containing spaces (the whole command passed as one
/// shell-quoted string) is split on whitespace.
fn parse_arguments(input: Vec<String>) -> Vec<String> {
    match input.first() {
        Some(first) if first.contains(' ') => {
            let mut split: Vec<String> =
                first.split_whitespace().map(str::to_string).collect();
            split.extend(input.into_iter().skip(1));
            split
        }
        _ => input,
    }
}

/// Append each flag that is not already present
fn ensure_flags(mut args: Vec<String>, flags: &[&str]) -> Vec<String> {
    for flag in flags {
        if !args.iter().any(|arg| arg == flag) {
            args.push(flag.to_string());
        }
    }
    args
}
