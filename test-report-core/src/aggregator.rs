//! Aggregation state machine
//!
//! Consumes the ordered event sequence one event at a time and incrementally
//! builds a [`Summary`]. The machine is strictly sequential: sub-test
//! attachment depends on the parent having been committed earlier in the
//! sequence, so events must be applied in exactly the order the sequencer
//! produced. There is one open package at a time and one current-test
//! cursor; no shared or static state, so independent aggregators can be
//! constructed freely.
//!
//! Test trees are built in arena storage with stable indices and only
//! materialized into the owned [`TestResult`] tree when a package is
//! finalized. That keeps the cursor a plain index while nodes are still
//! being attached and mutated.

use crate::types::{Event, EventKind, PackageResult, Summary, TestResult, Timestamp};
use std::collections::HashMap;

/// Stable handle to a node in a [`TestArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct TestNode {
    /// Leaf segment of the test path
    name: String,
    start_time: Timestamp,
    end_time: Option<Timestamp>,
    elapsed: f64,
    passed: bool,
    output: Vec<String>,
    children: Vec<NodeId>,
}

/// Index-based storage for one package's test tree
///
/// Roots are keyed by full slash-delimited path. Nodes whose parent could
/// not be resolved stay allocated but unreachable; they never appear in the
/// materialized tree.
#[derive(Debug, Default)]
pub struct TestArena {
    nodes: Vec<TestNode>,
    roots: HashMap<String, NodeId>,
}

impl TestArena {
    fn alloc(&mut self, name: String, start_time: Timestamp) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TestNode {
            name,
            start_time,
            end_time: None,
            elapsed: 0.0,
            passed: true,
            output: Vec::new(),
            children: Vec::new(),
        });
        id
    }

    /// Leaf name of a node
    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    /// Children of a node, in attachment order
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Root nodes keyed by full test path, in unspecified order
    pub fn roots(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.roots.iter().map(|(path, id)| (path.as_str(), *id))
    }

    /// Exact root lookup by full test path
    pub fn root(&self, path: &str) -> Option<NodeId> {
        self.roots.get(path).copied()
    }

    fn node_mut(&mut self, id: NodeId) -> &mut TestNode {
        &mut self.nodes[id.0]
    }

    /// True when every node in the subtree below `id` is passed
    fn subtree_passed(&self, id: NodeId) -> bool {
        self.nodes[id.0].children.iter().all(|child| {
            self.nodes[child.0].passed && self.subtree_passed(*child)
        })
    }

    fn materialize(&self, id: NodeId) -> TestResult {
        let node = &self.nodes[id.0];
        TestResult {
            name: node.name.clone(),
            start_time: node.start_time,
            end_time: node.end_time,
            elapsed: node.elapsed,
            passed: node.passed,
            output: node.output.clone(),
            subtests: node
                .children
                .iter()
                .map(|child| self.materialize(*child))
                .collect(),
        }
    }
}

/// Resolves a slash-delimited test path to a node in the arena
///
/// The strategy is swappable so the documented weak default can be replaced
/// by a full-path-keyed index without touching the state machine.
pub trait PathResolver {
    fn resolve(&self, path: &str, arena: &TestArena) -> Option<NodeId>;
}

/// Default resolution strategy: exact root match, then first leaf-name hit
///
/// The root map is checked for the full path first. Failing that, every
/// root's subtree is searched depth-first for the first node whose leaf
/// name equals the path's final segment, in unspecified root order. Two
/// root tests sharing a sub-test leaf name are therefore ambiguous; the
/// first match wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeafNameResolver;

impl LeafNameResolver {
    fn find_by_leaf(&self, arena: &TestArena, id: NodeId, leaf: &str) -> Option<NodeId> {
        for child in arena.children(id) {
            if arena.name(*child) == leaf {
                return Some(*child);
            }
            if let Some(found) = self.find_by_leaf(arena, *child, leaf) {
                return Some(found);
            }
        }
        None
    }
}

impl PathResolver for LeafNameResolver {
    fn resolve(&self, path: &str, arena: &TestArena) -> Option<NodeId> {
        if let Some(id) = arena.root(path) {
            return Some(id);
        }
        let leaf = path.rsplit('/').next().unwrap_or(path);
        for (_, root) in arena.roots() {
            if let Some(found) = self.find_by_leaf(arena, root, leaf) {
                return Some(found);
            }
        }
        None
    }
}

/// An event the state machine could not apply to the tree
///
/// Dropping is never fatal; the diagnostics channel exists so callers and
/// tests can observe what a best-effort run left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DroppedEvent {
    /// A nested test whose parent path did not resolve; the node is absent
    /// from the tree but its speculative counters stand
    UnresolvedParent { test: String },
    /// A completion event whose test path did not resolve
    UnresolvedTest { test: String },
    /// A test-scoped event arrived with no open package
    NoOpenPackage { test: String },
    /// A test-scoped output line arrived with no current test
    NoCurrentTest { test: String },
}

/// The package under construction, before finalization
#[derive(Debug)]
struct PackageState {
    name: String,
    start_time: Timestamp,
    passed: bool,
    output: Vec<String>,
    arena: TestArena,
}

impl PackageState {
    fn new(name: String, start_time: Timestamp) -> Self {
        Self {
            name,
            start_time,
            passed: true,
            output: Vec::new(),
            arena: TestArena::default(),
        }
    }

    fn finalize(self, end_time: Timestamp, elapsed: f64) -> PackageResult {
        // A package is failed if any of its root tests is failed, no matter
        // what its own completion event claimed.
        let passed = self
            .arena
            .roots()
            .all(|(_, id)| self.arena.nodes[id.0].passed);
        let test_results = self
            .arena
            .roots()
            .map(|(path, id)| (path.to_string(), self.arena.materialize(id)))
            .collect();
        PackageResult {
            package_name: self.name,
            start_time: self.start_time,
            end_time: Some(end_time),
            elapsed,
            passed,
            output: self.output,
            test_results,
        }
    }
}

/// Split a slash-delimited test path into parent path and leaf name
///
/// The parent path is empty for root tests.
fn split_test_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", path),
    }
}

/// The aggregation state machine
///
/// Apply events in sequence with [`apply`](Aggregator::apply) (or
/// [`extend`](Aggregator::extend)), then take the result with
/// [`into_summary`](Aggregator::into_summary). Partial input produces a
/// partial, structurally valid summary; nothing here is an error.
pub struct Aggregator {
    summary: Summary,
    current: Option<PackageState>,
    current_test: Option<NodeId>,
    resolver: Box<dyn PathResolver>,
    dropped: Vec<DroppedEvent>,
}

impl Aggregator {
    /// Create an aggregator with the default leaf-name resolver
    pub fn new() -> Self {
        Self::with_resolver(LeafNameResolver)
    }

    /// Create an aggregator with a custom path-resolution strategy
    pub fn with_resolver<R: PathResolver + 'static>(resolver: R) -> Self {
        Self {
            summary: Summary::default(),
            current: None,
            current_test: None,
            resolver: Box::new(resolver),
            dropped: Vec::new(),
        }
    }

    /// Apply a single event
    pub fn apply(&mut self, event: Event) {
        match event.kind {
            EventKind::Start => self.on_start(event),
            EventKind::Run => self.on_run(event),
            EventKind::Output => self.on_output(event),
            EventKind::Pass if event.test.is_empty() => self.finalize_package(&event),
            EventKind::Fail if event.test.is_empty() => self.finalize_package(&event),
            EventKind::Pass => self.on_pass(event),
            EventKind::Fail => self.on_fail(event),
            // Package-level exclusion already happened in the sequencer.
            EventKind::Skip | EventKind::Other => {}
        }
    }

    /// Apply a sequence of events in order
    pub fn extend<I: IntoIterator<Item = Event>>(&mut self, events: I) {
        for event in events {
            self.apply(event);
        }
    }

    /// The summary built so far
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Events dropped so far, in arrival order
    pub fn dropped(&self) -> &[DroppedEvent] {
        &self.dropped
    }

    /// Consume the aggregator and return the summary
    pub fn into_summary(self) -> Summary {
        self.summary
    }

    /// Begin a new package; last start wins
    ///
    /// Consecutive starts for the same package re-initialize, never merge.
    /// Any in-flight test state not yet finalized is abandoned.
    fn on_start(&mut self, event: Event) {
        if self.current.is_some() {
            log::debug!("start for {} abandons unfinalized package state", event.package);
        }
        self.current = Some(PackageState::new(event.package, event.time));
        self.current_test = None;
    }

    fn on_run(&mut self, event: Event) {
        // Counters move speculatively on every run event, reconciled later
        // by fail events; total_passed + total_failed always equals the
        // number of run events applied.
        self.summary.total_passed += 1;
        self.summary.total_packages += 1;

        let Some(pkg) = self.current.as_mut() else {
            self.dropped.push(DroppedEvent::NoOpenPackage { test: event.test });
            return;
        };

        let (parent_path, leaf) = split_test_path(&event.test);
        let id = pkg.arena.alloc(leaf.to_string(), event.time);

        if parent_path.is_empty() {
            pkg.arena.roots.insert(event.test.clone(), id);
        } else if let Some(parent) = self.resolver.resolve(parent_path, &pkg.arena) {
            pkg.arena.node_mut(parent).children.push(id);
        } else {
            log::debug!("parent {} not found for test {}", parent_path, event.test);
            self.dropped.push(DroppedEvent::UnresolvedParent { test: event.test });
        }
        self.current_test = Some(id);
    }

    /// Package-level output goes to the package; test-scoped output goes to
    /// whichever test is current. Attribution is by temporal proximity, not
    /// by the event's test path.
    fn on_output(&mut self, event: Event) {
        let Some(pkg) = self.current.as_mut() else {
            self.dropped.push(DroppedEvent::NoOpenPackage { test: event.test });
            return;
        };
        if event.test.is_empty() {
            pkg.output.push(event.output);
            return;
        }
        match self.current_test {
            Some(id) => pkg.arena.node_mut(id).output.push(event.output),
            None => self.dropped.push(DroppedEvent::NoCurrentTest { test: event.test }),
        }
    }

    fn on_pass(&mut self, event: Event) {
        let Some(pkg) = self.current.as_mut() else {
            self.dropped.push(DroppedEvent::NoOpenPackage { test: event.test });
            return;
        };
        match self.resolver.resolve(&event.test, &pkg.arena) {
            Some(id) => {
                // A parent is not passed while any descendant is failed,
                // regardless of the event saying pass.
                let passed = pkg.arena.subtree_passed(id);
                let node = pkg.arena.node_mut(id);
                node.end_time = Some(event.time);
                node.elapsed = event.elapsed;
                node.passed = passed;
            }
            None => self.dropped.push(DroppedEvent::UnresolvedTest { test: event.test }),
        }
    }

    fn on_fail(&mut self, event: Event) {
        // Reconcile the speculative increment from the run event.
        self.summary.total_failed += 1;
        self.summary.total_passed -= 1;

        let Some(pkg) = self.current.as_mut() else {
            self.dropped.push(DroppedEvent::NoOpenPackage { test: event.test });
            return;
        };

        match self.resolver.resolve(&event.test, &pkg.arena) {
            Some(id) => {
                let node = pkg.arena.node_mut(id);
                node.end_time = Some(event.time);
                node.elapsed = event.elapsed;
                node.passed = false;
            }
            None => self.dropped.push(DroppedEvent::UnresolvedTest {
                test: event.test.clone(),
            }),
        }

        if pkg.name == event.package {
            pkg.passed = false;
        }

        // Eagerly force every resolvable ancestor failed: the failing
        // child's own completion event may never reach each ancestor.
        let parts: Vec<&str> = event.test.split('/').collect();
        for i in (1..parts.len()).rev() {
            let ancestor = parts[..i].join("/");
            if let Some(id) = self.resolver.resolve(&ancestor, &pkg.arena) {
                pkg.arena.node_mut(id).passed = false;
            }
        }
    }

    /// Commit the open package on its top-level pass/fail event
    ///
    /// The finalized result is appended by value; later events can never
    /// mutate it, and a second package-level completion cannot append a
    /// duplicate entry.
    fn finalize_package(&mut self, event: &Event) {
        let Some(pkg) = self.current.take() else {
            return;
        };
        log::debug!("finalizing package {}", pkg.name);
        self.current_test = None;
        self.summary
            .package_results
            .push(pkg.finalize(event.time, event.elapsed));
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}
