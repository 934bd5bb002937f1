//! Core types for the test report engine
//!
//! This module defines the wire-level event decoded from the runner's
//! line-delimited JSON stream and the result tree the aggregator builds from
//! it. The engine is stateless with respect to I/O - it consumes events and
//! produces a [`Summary`]; it does not spawn processes or render anything.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Timestamp type used throughout the engine
pub type Timestamp = DateTime<Utc>;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, AggregateError>;

/// Errors that can occur while sequencing and aggregating a run
///
/// A build failure is the single fatal condition the engine recognizes.
/// Per-event problems (unparseable lines, unresolvable test paths) degrade
/// into non-event output or dropped-event diagnostics instead.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("there are build issues, please check the logs and source code:\n\n{diagnostics}")]
    BuildFailure { diagnostics: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Lifecycle action reported by the test runner
///
/// Unknown actions (the runner also emits things like `pause` and `cont`)
/// decode into [`EventKind::Other`] so the line still counts as an event and
/// is ignored by the state machine, rather than being misread as plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Run,
    Pass,
    Fail,
    Skip,
    Output,
    #[serde(other)]
    Other,
}

/// One decoded lifecycle event from the runner's JSON stream
///
/// Field names follow the runner's wire format: one JSON object per line
/// with capitalized keys. `test` is empty for package-level events and
/// slash-delimited for nested sub-tests (e.g. `"Parent/Child"`). `elapsed`
/// is in seconds and only meaningful on `pass`/`fail`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Event {
    #[serde(rename = "Time")]
    pub time: Timestamp,
    #[serde(rename = "Action")]
    pub kind: EventKind,
    #[serde(rename = "Package", default)]
    pub package: String,
    #[serde(rename = "Test", default)]
    pub test: String,
    #[serde(rename = "Output", default)]
    pub output: String,
    #[serde(rename = "Elapsed", default)]
    pub elapsed: f64,
}

impl Event {
    /// Attempt to decode one line of runner output as an event
    ///
    /// Returns `None` for lines that are not structured events (build
    /// output, compiler errors, stray prints). Such lines are never an
    /// error; the sequencer captures them verbatim.
    pub fn parse_line(line: &str) -> Option<Event> {
        serde_json::from_str(line).ok()
    }
}

/// Result of one test or sub-test
///
/// `name` is the final slash-delimited segment of the test path, not the
/// full path. A node with sub-tests derives its pass state from them once
/// its own completion event has been processed.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub name: String,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    /// Elapsed seconds as reported by the runner
    pub elapsed: f64,
    pub passed: bool,
    pub output: Vec<String>,
    /// Nested sub-tests, owned exclusively by this node
    pub subtests: Vec<TestResult>,
}

/// Result of one package's test run
#[derive(Debug, Clone, PartialEq)]
pub struct PackageResult {
    pub package_name: String,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    /// Elapsed seconds as reported by the runner
    pub elapsed: f64,
    pub passed: bool,
    /// Package-level log lines not attributable to a specific test
    pub output: Vec<String>,
    /// Root tests keyed by full slash-delimited test path
    pub test_results: HashMap<String, TestResult>,
}

/// The complete aggregated result of one run
///
/// The three counters count *tests*, not packages - `total_packages` is
/// incremented once per `run` event. The names are kept for output
/// compatibility with the totals lines consumers already parse. Counters
/// are incremented speculatively on `run` and reconciled on `fail`, so a
/// test cut off by a truncated stream stays counted as passed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub total_packages: i64,
    pub total_passed: i64,
    pub total_failed: i64,
    /// Completed packages in completion order, append-only
    pub package_results: Vec<PackageResult>,
}

impl Summary {
    /// Leaf names of failing tests, for the reporting collaborator
    ///
    /// Walks every root test and its immediate sub-tests. Only one level
    /// of nesting is inspected; deeper failures surface through their
    /// ancestors' forced-failed flags instead.
    pub fn failed_test_names(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for pkg in &self.package_results {
            for test in pkg.test_results.values() {
                if !test.passed {
                    failed.push(test.name.clone());
                }
                for subtest in &test.subtests {
                    if !subtest.passed {
                        failed.push(subtest.name.clone());
                    }
                }
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_event_line() {
        let line = r#"{"Time":"2024-05-01T10:00:00Z","Action":"run","Package":"example.com/pkg","Test":"TestFoo"}"#;
        let event = Event::parse_line(line).expect("valid event line");
        assert_eq!(event.kind, EventKind::Run);
        assert_eq!(event.package, "example.com/pkg");
        assert_eq!(event.test, "TestFoo");
        assert_eq!(event.output, "");
        assert_eq!(event.elapsed, 0.0);
        assert_eq!(event.time, ts());
    }

    #[test]
    fn test_parse_non_event_line() {
        assert!(Event::parse_line("# example.com/pkg").is_none());
        assert!(Event::parse_line("FAIL example.com/pkg [build failed]").is_none());
        assert!(Event::parse_line("").is_none());
    }

    #[test]
    fn test_parse_unknown_action() {
        let line = r#"{"Time":"2024-05-01T10:00:00Z","Action":"pause","Package":"example.com/pkg","Test":"TestFoo"}"#;
        let event = Event::parse_line(line).expect("unknown actions still decode");
        assert_eq!(event.kind, EventKind::Other);
    }

    #[test]
    fn test_parse_elapsed_seconds() {
        let line = r#"{"Time":"2024-05-01T10:00:02Z","Action":"pass","Package":"example.com/pkg","Test":"TestFoo","Elapsed":1.25}"#;
        let event = Event::parse_line(line).unwrap();
        assert_eq!(event.kind, EventKind::Pass);
        assert_eq!(event.elapsed, 1.25);
    }

    #[test]
    fn test_failed_test_names_walks_one_level() {
        let leaf = |name: &str, passed: bool| TestResult {
            name: name.to_string(),
            start_time: ts(),
            end_time: None,
            elapsed: 0.0,
            passed,
            output: Vec::new(),
            subtests: Vec::new(),
        };

        // A failing grandchild below a failing child: only the root and the
        // immediate sub-test are reported.
        let mut child = leaf("Child", false);
        child.subtests.push(leaf("Grandchild", false));
        let mut root = leaf("TestRoot", false);
        root.subtests.push(child);

        let mut test_results = HashMap::new();
        test_results.insert("TestRoot".to_string(), root);

        let summary = Summary {
            total_packages: 2,
            total_passed: 0,
            total_failed: 2,
            package_results: vec![PackageResult {
                package_name: "example.com/pkg".to_string(),
                start_time: ts(),
                end_time: None,
                elapsed: 0.0,
                passed: false,
                output: Vec::new(),
                test_results,
            }],
        };

        let mut names = summary.failed_test_names();
        names.sort();
        assert_eq!(names, vec!["Child".to_string(), "TestRoot".to_string()]);
    }

    #[test]
    fn test_empty_summary() {
        let summary = Summary::default();
        assert_eq!(summary.total_packages, 0);
        assert_eq!(summary.total_passed, 0);
        assert_eq!(summary.total_failed, 0);
        assert!(summary.package_results.is_empty());
        assert!(summary.failed_test_names().is_empty());
    }
}
