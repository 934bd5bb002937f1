//! Test Report Core Library
//!
//! A reusable engine that consumes the structured, line-delimited JSON event
//! stream of a test runner and reconstructs a hierarchical report of the
//! run: which packages ran, which tests and nested sub-tests passed or
//! failed, their timings, and their captured output.
//!
//! # Architecture
//!
//! Two components form the core, and data flows one way through them:
//!
//! - [`Sequencer`] normalizes raw lines into a time-ordered,
//!   per-package-contiguous event sequence, captures non-event output, and
//!   detects fatal build failures.
//! - [`Aggregator`] consumes the ordered sequence one event at a time and
//!   builds a [`Summary`]: a forest of [`PackageResult`] nodes, each holding
//!   a tree of [`TestResult`] nodes with pass/fail propagation up the
//!   hierarchy.
//!
//! The library does NOT:
//! - Spawn the test runner or capture its stdout/stderr
//! - Render tables or colorize anything
//! - Generate or persist report files
//!
//! All of that is in the application layer (test-report-cli). The engine
//! can be driven by any line-by-line source and yields a partial but valid
//! summary if the stream ends early.
//!
//! # Example Usage
//!
//! ```
//! use test_report_core::Sequencer;
//!
//! let mut sequencer = Sequencer::new();
//! sequencer.push_line(r#"{"Time":"2024-05-01T10:00:00Z","Action":"start","Package":"example.com/pkg"}"#);
//! sequencer.push_line(r#"{"Time":"2024-05-01T10:00:01Z","Action":"run","Package":"example.com/pkg","Test":"TestFoo"}"#);
//! sequencer.push_line(r#"{"Time":"2024-05-01T10:00:02Z","Action":"pass","Package":"example.com/pkg","Test":"TestFoo","Elapsed":1.0}"#);
//! sequencer.push_line(r#"{"Time":"2024-05-01T10:00:02Z","Action":"pass","Package":"example.com/pkg","Elapsed":2.0}"#);
//!
//! let events = sequencer.finish().unwrap();
//! let mut aggregator = test_report_core::Aggregator::new();
//! aggregator.extend(events);
//!
//! let summary = aggregator.into_summary();
//! assert_eq!(summary.package_results.len(), 1);
//! assert!(summary.package_results[0].passed);
//! ```

// Public modules
pub mod aggregator;
pub mod sequencer;
pub mod types;

// Re-export main types for convenience
pub use aggregator::{Aggregator, DroppedEvent, LeafNameResolver, NodeId, PathResolver, TestArena};
pub use sequencer::Sequencer;
pub use types::{
    AggregateError, Event, EventKind, PackageResult, Result, Summary, TestResult, Timestamp,
};

use std::io::BufRead;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Aggregate a whole run from a line-by-line source
///
/// Composes the sequencer and the state machine: reads every line, orders
/// the events, and returns the finished [`Summary`]. Fails only on I/O
/// errors from the reader or on a detected build failure, whose error
/// carries the runner's plain-text diagnostics.
pub fn aggregate<R: BufRead>(reader: R) -> Result<Summary> {
    let mut sequencer = Sequencer::new();
    sequencer.read_lines(reader)?;
    let events = sequencer.finish()?;

    let mut aggregator = Aggregator::new();
    aggregator.extend(events);
    Ok(aggregator.into_summary())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty stream is a valid, empty run.
        let summary = aggregate(&b""[..]).unwrap();
        assert_eq!(summary, Summary::default());
    }
}
