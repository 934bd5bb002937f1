//! Table rendering of the aggregated summary
//!
//! Renders the result tree as a terminal table: one row per root test, one
//! indented row per immediate sub-test, with colored pass/fail status.
//! Read-only over the summary; deeper nesting is reflected through the
//! forced-failed flags of the visible ancestors.

use colored::Colorize;
use regex::Regex;
use tabled::builder::Builder;
use tabled::settings::Style;
use test_report_core::{Summary, TestResult};

/// Rendering options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    only_fail: bool,
    only_pass: bool,
    ci_mode: bool,
}

impl RenderOptions {
    /// Create options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: only render failed tests
    pub fn with_only_fail(mut self, enabled: bool) -> Self {
        self.only_fail = enabled;
        self
    }

    /// Builder method: only render passed tests
    pub fn with_only_pass(mut self, enabled: bool) -> Self {
        self.only_pass = enabled;
        self
    }

    /// Builder method: ASCII table style for CI logs
    pub fn with_ci_mode(mut self, enabled: bool) -> Self {
        self.ci_mode = enabled;
        self
    }

    fn skips(&self, passed: bool) -> bool {
        (self.only_fail && passed) || (self.only_pass && !passed)
    }
}

/// Render the summary table to stdout
pub fn render_table(summary: &Summary, options: &RenderOptions) {
    println!("{}", build_table(summary, options));
}

/// Build the summary table as a string
pub fn build_table(summary: &Summary, options: &RenderOptions) -> String {
    let mut builder = Builder::default();
    builder.push_record(["#", "Name", "Status", "Time", "Output"]);

    let mut index = 0usize;
    for pkg in &summary.package_results {
        // The result map is unordered; render roots by start time so the
        // table is stable run to run.
        let mut tests: Vec<&TestResult> = pkg.test_results.values().collect();
        tests.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.name.cmp(&b.name))
        });

        for test in tests {
            if !options.skips(test.passed) {
                index += 1;
                builder.push_record(test_row(index, test, "", false));
            }
            for (pos, subtest) in test.subtests.iter().enumerate() {
                if options.skips(subtest.passed) {
                    continue;
                }
                index += 1;
                let last = pos + 1 == test.subtests.len();
                builder.push_record(test_row(index, subtest, " ", last));
            }
        }
    }

    let mut table = builder.build();
    if options.ci_mode {
        table.with(Style::ascii());
    } else {
        table.with(Style::modern());
    }
    table.to_string()
}

fn test_row(index: usize, test: &TestResult, indent: &str, last: bool) -> Vec<String> {
    let status = if test.passed {
        "✓ pass".green().to_string()
    } else {
        "× fail".red().to_string()
    };

    let name = if test.passed {
        test.name.green().to_string()
    } else {
        test.name.red().to_string()
    };
    let name = if indent.is_empty() {
        name
    } else {
        let symbol = if last { "╰─ " } else { "├─ " };
        format!("{}{}{}", indent, symbol, name)
    };

    // Passing tests render without output; failing ones show only the
    // extracted error block.
    let output = if test.passed {
        String::new()
    } else {
        extract_error(&normalize_output(&test.output)).unwrap_or_default()
    };

    vec![
        index.to_string(),
        name,
        status,
        fmt_elapsed(test.elapsed),
        output,
    ]
}

/// Format elapsed seconds for the Time column
fn fmt_elapsed(elapsed: f64) -> String {
    if elapsed == 0.0 {
        "0.000s".to_string()
    } else {
        format!("{:.3}s", elapsed)
    }
}

/// Collapse the runner's double spacing and trailing newline
fn normalize_output(lines: &[String]) -> String {
    let mut output = lines.join("\n");
    output = output.replace("\n\n", "\n");
    output = output.replace("\t\t", "\t");
    if output.ends_with('\n') {
        output.pop();
    }
    output
}

/// Extract the `Error: ... Test:` block from assertion-library output
///
/// Returns `None` when the output carries no such block; the caller renders
/// an empty cell in that case.
fn extract_error(text: &str) -> Option<String> {
    let re = Regex::new(r"(?s)Error:(.*?)\n\s*Test:").expect("hardcoded pattern compiles");
    let captures = re.captures(text)?;
    let block = captures.get(1)?.as_str().replace('\t', " ");
    Some(block.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use test_report_core::{PackageResult, Timestamp};

    fn ts(secs: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, secs).unwrap()
    }

    fn test_result(name: &str, secs: u32, passed: bool) -> TestResult {
        TestResult {
            name: name.to_string(),
            start_time: ts(secs),
            end_time: Some(ts(secs + 1)),
            elapsed: 1.0,
            passed,
            output: Vec::new(),
            subtests: Vec::new(),
        }
    }

    fn summary_with(tests: Vec<TestResult>) -> Summary {
        let mut test_results = HashMap::new();
        let mut passed = true;
        for test in tests {
            passed = passed && test.passed;
            test_results.insert(test.name.clone(), test);
        }
        Summary {
            total_packages: test_results.len() as i64,
            total_passed: test_results.values().filter(|t| t.passed).count() as i64,
            total_failed: test_results.values().filter(|t| !t.passed).count() as i64,
            package_results: vec![PackageResult {
                package_name: "example.com/pkg".to_string(),
                start_time: ts(0),
                end_time: Some(ts(9)),
                elapsed: 9.0,
                passed,
                output: Vec::new(),
                test_results,
            }],
        }
    }

    #[test]
    fn test_table_contains_status_cells() {
        let summary = summary_with(vec![
            test_result("TestPass", 1, true),
            test_result("TestFail", 2, false),
        ]);
        let table = build_table(&summary, &RenderOptions::new());
        assert!(table.contains("✓ pass"));
        assert!(table.contains("× fail"));
        assert!(table.contains("TestPass"));
        assert!(table.contains("TestFail"));
    }

    #[test]
    fn test_roots_render_in_start_time_order() {
        let summary = summary_with(vec![
            test_result("TestLate", 5, true),
            test_result("TestEarly", 1, true),
        ]);
        let table = build_table(&summary, &RenderOptions::new());
        let early = table.find("TestEarly").unwrap();
        let late = table.find("TestLate").unwrap();
        assert!(early < late);
    }

    #[test]
    fn test_subtests_get_branch_glyphs() {
        let mut parent = test_result("TestParent", 1, false);
        parent.subtests.push(test_result("First", 2, false));
        parent.subtests.push(test_result("Second", 3, false));
        let summary = summary_with(vec![parent]);

        let table = build_table(&summary, &RenderOptions::new());
        assert!(table.contains("├─ "));
        assert!(table.contains("╰─ "));
    }

    #[test]
    fn test_only_fail_filters_passing_rows() {
        let summary = summary_with(vec![
            test_result("TestPass", 1, true),
            test_result("TestFail", 2, false),
        ]);
        let table = build_table(&summary, &RenderOptions::new().with_only_fail(true));
        assert!(!table.contains("TestPass"));
        assert!(table.contains("TestFail"));
    }

    #[test]
    fn test_failing_output_reduced_to_error_block() {
        let mut failing = test_result("TestFail", 1, false);
        failing.output = vec![
            "=== RUN   TestFail".to_string(),
            "    Error:      \tNot equal: 1 != 2".to_string(),
            "    Test:       \tTestFail".to_string(),
        ];
        let summary = summary_with(vec![failing]);
        let table = build_table(&summary, &RenderOptions::new());
        assert!(table.contains("Not equal"));
        assert!(!table.contains("=== RUN"));
    }

    #[test]
    fn test_extract_error() {
        let text = "something\nError:\tNot equal\n  Test: TestX\nrest";
        assert_eq!(extract_error(text), Some("Not equal".to_string()));
        assert_eq!(extract_error("no block here"), None);
    }

    #[test]
    fn test_fmt_elapsed() {
        assert_eq!(fmt_elapsed(0.0), "0.000s");
        assert_eq!(fmt_elapsed(1.5), "1.500s");
        assert_eq!(fmt_elapsed(0.0421), "0.042s");
    }

    #[test]
    fn test_normalize_output() {
        let lines = vec!["a\n".to_string(), "b\n".to_string()];
        assert_eq!(normalize_output(&lines), "a\nb");
    }
}
