//! Write-only output sinks for scenario progress
//!
//! The runner reports every scenario and step through a [`ScenarioSink`].
//! Sinks never influence control flow.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info};

const RULE_WIDTH: usize = 50;

/// Receives step labels, timings and failures from a running scenario.
///
/// `label` is the display prefix ("Given", " When", "  And", ...) and is
/// already padded for alignment.
pub trait ScenarioSink: Send + Sync {
    fn scenario_started(&self, _scenario: &str) {}

    fn step_started(&self, _label: &str, _description: &str) {}

    fn step_passed(&self, _label: &str, _description: &str, _elapsed: Duration) {}

    fn step_failed(
        &self,
        _label: &str,
        _description: &str,
        _elapsed: Duration,
        _error: &anyhow::Error,
    ) {
    }

    fn scenario_passed(&self, _scenario: &str, _step_count: usize) {}
}

/// Discards everything. The default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ScenarioSink for NullSink {}

/// Forwards progress to `tracing` at info level and failures at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ScenarioSink for TracingSink {
    fn scenario_started(&self, scenario: &str) {
        info!(scenario, "Scenario started");
    }

    fn step_passed(&self, label: &str, description: &str, elapsed: Duration) {
        info!(
            step = %format!("{} {}", label.trim(), description),
            elapsed_ms = elapsed.as_millis() as u64,
            "Step completed"
        );
    }

    fn step_failed(&self, label: &str, description: &str, elapsed: Duration, err: &anyhow::Error) {
        error!(
            step = %format!("{} {}", label.trim(), description),
            elapsed_ms = elapsed.as_millis() as u64,
            "Step failed: {:#}",
            err
        );
    }

    fn scenario_passed(&self, scenario: &str, step_count: usize) {
        info!(scenario, step_count, "Scenario completed");
    }
}

/// Line-oriented test output, the layout a test log shows:
///
/// ```text
/// Scenario: user login
/// --------------------------------------------------
///
/// Given a user with valid credentials
///   Completed in 0ms
///   ...
/// ```
#[derive(Debug, Default, Clone, Copy)]
struct Layout;

impl Layout {
    fn scenario_started(scenario: &str) -> Vec<String> {
        vec![format!("\nScenario: {scenario}"), "-".repeat(RULE_WIDTH)]
    }

    fn step_started(label: &str, description: &str) -> String {
        format!("\n{label} {description}")
    }

    fn step_passed(elapsed: Duration) -> String {
        format!("  Completed in {}ms", elapsed.as_millis())
    }

    fn step_failed() -> String {
        "  Failed".to_string()
    }

    fn scenario_passed(step_count: usize) -> Vec<String> {
        vec![
            format!("\n{}", "-".repeat(RULE_WIDTH)),
            format!("Scenario completed successfully with {step_count} step(s)\n"),
        ]
    }
}

/// Writes the test-output layout to any `io::Write` (stdout, a file, a buffer).
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_line(&self, line: &str) {
        // Output is best effort; a broken pipe must not fail the scenario.
        let _ = writeln!(self.writer.lock(), "{line}");
    }
}

impl WriterSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ScenarioSink for WriterSink<W> {
    fn scenario_started(&self, scenario: &str) {
        for line in Layout::scenario_started(scenario) {
            self.write_line(&line);
        }
    }

    fn step_started(&self, label: &str, description: &str) {
        self.write_line(&Layout::step_started(label, description));
    }

    fn step_passed(&self, _label: &str, _description: &str, elapsed: Duration) {
        self.write_line(&Layout::step_passed(elapsed));
    }

    fn step_failed(&self, _label: &str, _description: &str, _elapsed: Duration, _: &anyhow::Error) {
        self.write_line(&Layout::step_failed());
    }

    fn scenario_passed(&self, _scenario: &str, step_count: usize) {
        for line in Layout::scenario_passed(step_count) {
            self.write_line(&line);
        }
    }
}

/// Captures the test-output layout in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }

    fn push(&self, line: String) {
        self.lines.lock().push(line);
    }
}

impl ScenarioSink for MemorySink {
    fn scenario_started(&self, scenario: &str) {
        for line in Layout::scenario_started(scenario) {
            self.push(line);
        }
    }

    fn step_started(&self, label: &str, description: &str) {
        self.push(Layout::step_started(label, description));
    }

    fn step_passed(&self, _label: &str, _description: &str, elapsed: Duration) {
        self.push(Layout::step_passed(elapsed));
    }

    fn step_failed(&self, _label: &str, _description: &str, _elapsed: Duration, _: &anyhow::Error) {
        self.push(Layout::step_failed());
    }

    fn scenario_passed(&self, _scenario: &str, step_count: usize) {
        for line in Layout::scenario_passed(step_count) {
            self.push(line);
        }
    }
}
