//! Fluent scenario builder and the sequential step runner

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::ScenarioContext;
use crate::error::{OrderingError, ScenarioError};
use crate::phase::{self, Phase, StepKind};
use crate::sink::{NullSink, ScenarioSink};

/// Asynchronous step action. Every synchronous action is adapted into this shape.
pub type StepAction =
    Box<dyn for<'a> FnMut(&'a mut ScenarioContext) -> BoxFuture<'a, anyhow::Result<()>> + Send>;

/// Return values a synchronous step action may produce.
pub trait StepOutcome {
    fn into_result(self) -> anyhow::Result<()>;
}

impl StepOutcome for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E> StepOutcome for Result<(), E>
where
    E: Into<anyhow::Error>,
{
    fn into_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

struct Step {
    kind: StepKind,
    description: String,
    action: StepAction,
}

/// Read-only view of an appended step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    pub kind: StepKind,
    pub description: String,
}

/// Everything one build+run cycle accumulates. Moved out of the scenario as
/// a whole when a run starts, so nothing survives into the next cycle.
#[derive(Default)]
struct Book {
    steps: Vec<Step>,
    phase: Phase,
    last_kind: Option<StepKind>,
    poisoned: Option<OrderingError>,
}

/// One logical test case: an ordered list of Given/When/Then steps sharing a context.
pub struct Scenario {
    description: String,
    sink: Arc<dyn ScenarioSink>,
    book: Book,
}

impl Scenario {
    /// Create a scenario that reports to no sink
    pub fn new(description: impl Into<String>) -> Self {
        Self::with_sink(description, Arc::new(NullSink))
    }

    /// Create a scenario that reports step labels, timings and failures to `sink`
    pub fn with_sink(description: impl Into<String>, sink: Arc<dyn ScenarioSink>) -> Self {
        Self {
            description: description.into(),
            sink,
            book: Book::default(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Furthest phase reached by the steps appended so far
    pub fn phase(&self) -> Phase {
        self.book.phase
    }

    /// Kind of the most recently appended step
    pub fn last_kind(&self) -> Option<StepKind> {
        self.book.last_kind
    }

    pub fn steps(&self) -> Vec<StepInfo> {
        self.book
            .steps
            .iter()
            .map(|s| StepInfo {
                kind: s.kind,
                description: s.description.clone(),
            })
            .collect()
    }

    /// Set up the initial state. Only allowed before any When or Then.
    pub fn given<F, R>(&mut self, description: impl Into<String>, action: F) -> Result<&mut Self, ScenarioError>
    where
        F: FnMut(&mut ScenarioContext) -> R + Send + 'static,
        R: StepOutcome,
    {
        self.push(StepKind::Given, description.into(), sync_action(action))
    }

    pub fn given_async<F>(&mut self, description: impl Into<String>, action: F) -> Result<&mut Self, ScenarioError>
    where
        F: for<'a> FnMut(&'a mut ScenarioContext) -> BoxFuture<'a, anyhow::Result<()>> + Send + 'static,
    {
        self.push(StepKind::Given, description.into(), async_action(action))
    }

    /// Perform the action under test. Not allowed after a Then.
    pub fn when<F, R>(&mut self, description: impl Into<String>, action: F) -> Result<&mut Self, ScenarioError>
    where
        F: FnMut(&mut ScenarioContext) -> R + Send + 'static,
        R: StepOutcome,
    {
        self.push(StepKind::When, description.into(), sync_action(action))
    }

    pub fn when_async<F>(&mut self, description: impl Into<String>, action: F) -> Result<&mut Self, ScenarioError>
    where
        F: for<'a> FnMut(&'a mut ScenarioContext) -> BoxFuture<'a, anyhow::Result<()>> + Send + 'static,
    {
        self.push(StepKind::When, description.into(), async_action(action))
    }

    /// Verify an outcome. Requires a preceding When.
    pub fn then<F, R>(&mut self, description: impl Into<String>, action: F) -> Result<&mut Self, ScenarioError>
    where
        F: FnMut(&mut ScenarioContext) -> R + Send + 'static,
        R: StepOutcome,
    {
        self.push(StepKind::Then, description.into(), sync_action(action))
    }

    pub fn then_async<F>(&mut self, description: impl Into<String>, action: F) -> Result<&mut Self, ScenarioError>
    where
        F: for<'a> FnMut(&'a mut ScenarioContext) -> BoxFuture<'a, anyhow::Result<()>> + Send + 'static,
    {
        self.push(StepKind::Then, description.into(), async_action(action))
    }

    /// Continue the kind of the most recently appended step.
    pub fn and<F, R>(&mut self, description: impl Into<String>, action: F) -> Result<&mut Self, ScenarioError>
    where
        F: FnMut(&mut ScenarioContext) -> R + Send + 'static,
        R: StepOutcome,
    {
        self.push_and(description.into(), sync_action(action))
    }

    pub fn and_async<F>(&mut self, description: impl Into<String>, action: F) -> Result<&mut Self, ScenarioError>
    where
        F: for<'a> FnMut(&'a mut ScenarioContext) -> BoxFuture<'a, anyhow::Result<()>> + Send + 'static,
    {
        self.push_and(description.into(), async_action(action))
    }

    fn push(&mut self, kind: StepKind, description: String, action: StepAction) -> Result<&mut Self, ScenarioError> {
        let next = match phase::validate(self.book.phase, kind) {
            Ok(next) => next,
            Err(e) => return Err(self.poison(e)),
        };
        self.book.phase = next;
        self.append(kind, description, action);
        Ok(self)
    }

    // And only reads the last-kind cursor; the phase cursor is left alone.
    fn push_and(&mut self, description: String, action: StepAction) -> Result<&mut Self, ScenarioError> {
        let kind = match self.book.last_kind {
            Some(kind) => kind,
            None => return Err(self.poison(OrderingError::AndWithoutPrecedingStep)),
        };
        self.append(kind, description, action);
        Ok(self)
    }

    fn append(&mut self, kind: StepKind, description: String, action: StepAction) {
        debug!(scenario = %self.description, "Appending {} step: {}", kind, description);
        self.book.steps.push(Step {
            kind,
            description,
            action,
        });
        self.book.last_kind = Some(kind);
    }

    fn poison(&mut self, err: OrderingError) -> ScenarioError {
        warn!(scenario = %self.description, "Step ordering error: {}", err);
        self.book.poisoned.get_or_insert(err);
        ScenarioError::Ordering(err)
    }

    /// Execute every step in append order against a fresh context.
    ///
    /// Stops at the first failing step. The step list, both cursors and the
    /// context are reset on every exit path, so the scenario can be rebuilt
    /// and run again.
    pub async fn run(&mut self) -> Result<(), ScenarioError> {
        self.execute(None).await
    }

    /// Like [`run`](Self::run), but checks `cancel` before starting each step.
    pub async fn run_with_cancel(&mut self, cancel: &CancellationToken) -> Result<(), ScenarioError> {
        self.execute(Some(cancel)).await
    }

    async fn execute(&mut self, cancel: Option<&CancellationToken>) -> Result<(), ScenarioError> {
        // Taking the book resets the builder immediately; the steps and the
        // context are dropped when this function returns or its future is dropped.
        let Book {
            mut steps, poisoned, ..
        } = std::mem::take(&mut self.book);
        let mut context = ScenarioContext::new();

        if let Some(err) = poisoned {
            return Err(ScenarioError::Ordering(err));
        }

        let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind).collect();
        let sink = Arc::clone(&self.sink);

        info!(scenario = %self.description, steps = steps.len(), "Running scenario");
        sink.scenario_started(&self.description);

        for (index, step) in steps.iter_mut().enumerate() {
            let label = phase::step_prefix(&kinds, index);
            let step_name = format!("{} {}", step.kind, step.description);

            if cancel.is_some_and(|token| token.is_cancelled()) {
                warn!(scenario = %self.description, "Cancelled before step: {}", step_name);
                return Err(ScenarioError::Cancelled {
                    scenario: self.description.clone(),
                    step: step_name,
                });
            }

            debug!("{} {}", label, step.description);
            sink.step_started(label, &step.description);

            let start = Instant::now();
            let outcome = invoke(&mut step.action, &mut context).await;
            let elapsed = start.elapsed();

            match outcome {
                Ok(()) => {
                    debug!(elapsed_ms = elapsed.as_millis() as u64, "Step completed: {}", step_name);
                    sink.step_passed(label, &step.description, elapsed);
                }
                Err(source) => {
                    warn!(
                        scenario = %self.description,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Step failed: {}: {:#}",
                        step_name,
                        source
                    );
                    sink.step_failed(label, &step.description, elapsed, &source);
                    return Err(ScenarioError::StepFailed {
                        scenario: self.description.clone(),
                        step: step_name,
                        source,
                    });
                }
            }
        }

        info!(scenario = %self.description, "Scenario completed with {} step(s)", steps.len());
        sink.scenario_passed(&self.description, steps.len());
        Ok(())
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("description", &self.description)
            .field("steps", &self.steps())
            .field("phase", &self.book.phase)
            .field("last_kind", &self.book.last_kind)
            .finish()
    }
}

fn async_action<F>(action: F) -> StepAction
where
    F: for<'a> FnMut(&'a mut ScenarioContext) -> BoxFuture<'a, anyhow::Result<()>> + Send + 'static,
{
    Box::new(action)
}

fn sync_action<F, R>(mut action: F) -> StepAction
where
    F: FnMut(&mut ScenarioContext) -> R + Send + 'static,
    R: StepOutcome,
{
    async_action(move |ctx| future::ready(action(ctx).into_result()).boxed())
}

/// Run one action. A panic while building or polling its future becomes an error.
async fn invoke(action: &mut StepAction, ctx: &mut ScenarioContext) -> anyhow::Result<()> {
    let future = match panic::catch_unwind(AssertUnwindSafe(move || {
        let ctx = ctx;
        action(ctx)
    })) {
        Ok(future) => future,
        Err(payload) => return Err(panic_to_error(payload)),
    };
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(panic_to_error(payload)))
}

fn panic_to_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    anyhow::anyhow!("step panicked: {message}")
}
