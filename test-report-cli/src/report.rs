//! HTML report generation
//!
//! Renders the aggregated summary as a standalone HTML document: a summary
//! block with the run totals, an anchor list of failed tests, and the
//! result table with one anchor row per test so the failed-test links jump
//! straight to the row.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use test_report_core::{Summary, TestResult};

/// Generate the HTML report and save it under the given path
///
/// The file is named `<name>.html`, with a timestamped default when no
/// custom name is given. Directories are created as needed. Returns the
/// path of the written file.
pub fn generate_and_save(summary: &Summary, path: &Path, name: Option<&str>) -> Result<PathBuf> {
    fs::create_dir_all(path)
        .with_context(|| format!("error creating report directory {:?}", path))?;

    let timestamp = chrono::Local::now();
    let report_name = match name {
        Some(name) => name.to_string(),
        None => format!("report_{}", timestamp.format("%Y%m%d_%H%M%S")),
    };

    let html = render_report(
        summary,
        &format!("Report {}", timestamp.format("%Y%m%d_%H%M%S")),
        &timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
    );

    let filename = path.join(format!("{}.html", report_name));
    fs::write(&filename, html)
        .with_context(|| format!("error writing report to {:?}", filename))?;

    log::info!("report saved to {:?}", filename);
    println!("Report saved to {}", filename.display());
    Ok(filename)
}

/// Render the full report document
fn render_report(summary: &Summary, report_name: &str, generated_at: &str) -> String {
    let is_passed = summary.total_failed == 0;
    let status = if is_passed {
        r#"<span class="fg-green">PASS</span>"#
    } else {
        r#"<span class="fg-red">FAIL</span>"#
    };

    let failed_block = if is_passed {
        String::new()
    } else {
        let items: String = summary
            .failed_test_names()
            .iter()
            .map(|name| {
                format!(
                    "      <li><a href=\"#{0}\">{0}</a></li>\n",
                    escape_html(name)
                )
            })
            .collect();
        format!(
            "<div class=\"failed-tests\">\n  <h3>Failed Tests</h3>\n  <ul>\n{}  </ul>\n</div>\n",
            items
        )
    };

    REPORT_TEMPLATE
        .replace("__REPORT_NAME__", &escape_html(report_name))
        .replace("__GENERATED_AT__", generated_at)
        .replace("__TOTAL__", &summary.total_packages.to_string())
        .replace("__PASSED__", &summary.total_passed.to_string())
        .replace("__FAILED__", &summary.total_failed.to_string())
        .replace("__STATUS__", status)
        .replace("__FAILED_TESTS__", &failed_block)
        .replace("__TABLE__", &render_table_html(summary))
}

/// Render the result table, one anchor row per test
fn render_table_html(summary: &Summary) -> String {
    let mut rows = String::new();
    let mut index = 0usize;
    for pkg in &summary.package_results {
        let mut tests: Vec<&TestResult> = pkg.test_results.values().collect();
        tests.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.name.cmp(&b.name))
        });
        for test in tests {
            index += 1;
            rows.push_str(&test_row_html(index, test, false));
            for subtest in &test.subtests {
                index += 1;
                rows.push_str(&test_row_html(index, subtest, true));
            }
        }
    }

    format!(
        "<table class=\"results-table\">\n<thead>\n<tr><th>#</th><th>Name</th><th>Status</th><th>Time</th><th>Output</th></tr>\n</thead>\n<tbody>\n{}</tbody>\n</table>\n",
        rows
    )
}

fn test_row_html(index: usize, test: &TestResult, nested: bool) -> String {
    let name = escape_html(&test.name);
    let (class, status) = if test.passed {
        ("fg-green", "pass")
    } else {
        ("fg-red", "fail")
    };
    let display_name = if nested {
        format!("&nbsp;&nbsp;{}", name)
    } else {
        name.clone()
    };
    let output = if test.passed {
        String::new()
    } else {
        escape_html(&test.output.join("\n")).replace('\n', "<br>")
    };
    format!(
        "<tr id=\"{}\"><td>{}</td><td class=\"{}\">{}</td><td class=\"{}\">{}</td><td>{:.3}s</td><td>{}</td></tr>\n",
        name, index, class, display_name, class, status, test.elapsed, output
    )
}

/// Minimal HTML escaping for text interpolated into the template
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// The template used to generate the report
const REPORT_TEMPLATE: &str = r#"<html>
<head>
<meta http-equiv="Content-Type" content="text/html; charset=UTF-8">
<title>__REPORT_NAME__</title>
<style>
  body {
      font-family: "Helvetica Neue",Helvetica,Arial,sans-serif;
      font-size: 14px;
      line-height: 1.42857143;
      color: #333;
      background-color: #fff;
  }
  .results-table {
      border-collapse: collapse;
      border-spacing: 0;
      border: 1px solid #ddd;
      width: 100%;
      margin-bottom: 20px;
      background-color: transparent;
  }
  .results-table th,
  .results-table td {
      border: 1px solid #ddd;
      padding: 8px;
      text-align: left;
  }
  .results-table th {
      background-color: #f5f5f5;
      color: #333;
  }
  .results-table tr:nth-child(even) {
      background-color: #f2f2f2;
  }
  .results-table tr:hover {
      background-color: #f5f5f5;
  }
  .fg-red {
      color: #a94442;
  }
  .fg-green {
      color: #3c763d;
  }
  .summary {
    border: 1px solid #ddd;
    border-radius: 4px;
    padding: 15px;
    background-color: #f9f9f9;
    margin-bottom: 20px;
  }
  .summary h3 {
    margin-top: 0;
    color: #333;
  }
  .summary-table {
    width: 100%;
    border-collapse: collapse;
  }
  .summary-table th,
  .summary-table td {
    text-align: left;
    padding: 8px;
    border-bottom: 1px solid #ddd;
  }
  .failed-tests {
    border: 1px solid #ddd;
    border-radius: 4px;
    padding: 15px;
    background-color: #fdfdfd;
    margin-top: 20px;
    box-shadow: 0 2px 4px rgba(0, 0, 0, 0.1);
  }
  .failed-tests h3 {
    margin-top: 0;
    color: #a94442;
  }
  .failed-tests ul {
    list-style-type: none;
    padding-left: 0;
  }
  .failed-tests ul li {
    margin-bottom: 10px;
  }
  .failed-tests ul li a {
    color: black;
    text-decoration: none;
  }
  .failed-tests ul li a:hover {
    text-decoration: underline;
  }
</style>
</head>
<body>
<div class="summary">
  <h3>__REPORT_NAME__</h3>
  <table class="summary-table">
    <tr>
      <th>Generated at:</th>
      <td>__GENERATED_AT__</td>
    </tr>
    <tr>
      <th>Total:</th>
      <td>__TOTAL__</td>
    </tr>
    <tr>
      <th>Passed:</th>
      <td>__PASSED__</td>
    </tr>
    <tr>
      <th>Failed:</th>
      <td>__FAILED__</td>
    </tr>
    <tr>
      <th>Status:</th>
      <td>__STATUS__</td>
    </tr>
  </table>
</div>
__FAILED_TESTS__
__TABLE__
</body>
</html>"#;
