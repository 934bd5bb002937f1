//! Event sequencing
//!
//! Normalizes the runner's raw line stream into the ordered event sequence
//! the aggregation state machine consumes. The runner may interleave output
//! from concurrently executing packages; the sequencer sorts events by
//! timestamp and regroups them so each package's events are contiguous,
//! which lets the state machine stay strictly sequential with a single
//! open-package cursor.
//!
//! Lines that do not decode as events are captured verbatim. They carry the
//! runner's plain-text diagnostics, including the one condition that is
//! fatal for the whole run: a build failure.

use crate::types::{AggregateError, Event, EventKind, Result};
use std::collections::HashMap;
use std::io::BufRead;

/// Accumulates raw runner output lines and produces an ordered event stream
///
/// Drive it with [`push_line`](Sequencer::push_line) from any line-by-line
/// source, then call [`finish`](Sequencer::finish) once the stream ends.
#[derive(Debug, Default)]
pub struct Sequencer {
    events: Vec<Event>,
    non_event_lines: Vec<String>,
    build_failure: bool,
}

/// A line beginning with the runner's FAIL marker and carrying the
/// build-failed tag means the code under test did not compile.
fn is_build_failure_line(line: &str) -> bool {
    line.starts_with("FAIL") && line.contains("[build failed]")
}

impl Sequencer {
    /// Create a new, empty sequencer
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw line of runner output
    ///
    /// Lines that decode as events are queued for ordering; everything else
    /// is recorded as non-event output and checked against the
    /// build-failure marker.
    pub fn push_line(&mut self, line: &str) {
        match Event::parse_line(line) {
            Some(event) => self.events.push(event),
            None => {
                if is_build_failure_line(line) {
                    log::debug!("build failure marker seen: {}", line);
                    self.build_failure = true;
                }
                self.non_event_lines.push(line.to_string());
            }
        }
    }

    /// Feed every line from a reader
    ///
    /// Convenience for driving the sequencer from a pipe or file; the
    /// engine makes no assumption about the source's buffering behavior.
    pub fn read_lines<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            self.push_line(&line?);
        }
        Ok(())
    }

    /// Non-event lines collected so far, verbatim
    pub fn non_event_lines(&self) -> &[String] {
        &self.non_event_lines
    }

    /// Whether the build-failure marker has been seen
    pub fn has_build_failure(&self) -> bool {
        self.build_failure
    }

    /// Consume the sequencer and produce the ordered event stream
    ///
    /// Returns [`AggregateError::BuildFailure`] carrying all collected
    /// non-event lines if the build-failure marker was seen; the run must
    /// not proceed to aggregation or rendering in that case.
    ///
    /// Otherwise events are stably sorted by ascending timestamp and then
    /// grouped so each package's events are contiguous, in first-seen
    /// package order. Any package with a `skip` action at any position is
    /// excluded entirely - none of its events are forwarded, including
    /// those received before the skip marker. An empty input produces an
    /// empty stream.
    pub fn finish(self) -> Result<Vec<Event>> {
        if self.build_failure {
            return Err(AggregateError::BuildFailure {
                diagnostics: self.non_event_lines.join("\n"),
            });
        }

        let mut events = self.events;
        events.sort_by_key(|event| event.time);

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Event>> = HashMap::new();
        for event in events {
            if !groups.contains_key(&event.package) {
                order.push(event.package.clone());
            }
            groups.entry(event.package.clone()).or_default().push(event);
        }

        let mut ordered = Vec::new();
        for package in order {
            if let Some(group) = groups.remove(&package) {
                if group.iter().any(|event| event.kind == EventKind::Skip) {
                    log::debug!("excluding package {} (skip observed)", package);
                    continue;
                }
                ordered.extend(group);
            }
        }
        Ok(ordered)
    }
}
