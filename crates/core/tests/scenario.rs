//! Scenario engine behaviour: ordering rules, execution order, failure
//! attribution and the per-run reset.

use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

use acceptest_core::{
    MemorySink, OrderingError, Scenario, ScenarioContext, ScenarioError, StepKind,
};
use parking_lot::Mutex;
use test_case::test_case;
use tokio_util::sync::CancellationToken;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn noop(_: &mut ScenarioContext) {}

/// Step action that appends `name` to the shared execution log
fn record(log: &Log, name: &'static str) -> impl FnMut(&mut ScenarioContext) + Send + 'static {
    let log = Arc::clone(log);
    move |_| log.lock().push(name)
}

#[derive(Debug, Clone, Copy)]
enum Call {
    Given,
    When,
    Then,
    And,
}

fn append(scenario: &mut Scenario, call: Call) -> Result<(), ScenarioError> {
    match call {
        Call::Given => scenario.given("given", noop).map(drop),
        Call::When => scenario.when("when", noop).map(drop),
        Call::Then => scenario.then("then", noop).map(drop),
        Call::And => scenario.and("and", noop).map(drop),
    }
}

#[test_case(&[]; "empty")]
#[test_case(&[Call::Given]; "given only")]
#[test_case(&[Call::When]; "when only")]
#[test_case(&[Call::When, Call::Then]; "when then without given")]
#[test_case(&[Call::Given, Call::Given, Call::Given, Call::When, Call::Then]; "many givens")]
#[test_case(&[Call::Given, Call::When, Call::When, Call::When, Call::Then]; "many whens")]
#[test_case(&[Call::Given, Call::When, Call::Then, Call::Then, Call::Then]; "many thens")]
#[test_case(&[Call::Given, Call::And, Call::When, Call::And, Call::Then, Call::And]; "and after each kind")]
#[test_case(&[Call::Given, Call::When]; "no then")]
fn test_valid_orderings_are_accepted(calls: &[Call]) {
    let mut scenario = Scenario::new("Test");
    for call in calls {
        append(&mut scenario, *call).unwrap();
    }
    assert_eq!(scenario.steps().len(), calls.len());
}

#[test_case(&[Call::Then], OrderingError::ThenBeforeWhen; "then first")]
#[test_case(&[Call::Given, Call::Then], OrderingError::ThenBeforeWhen; "then after given")]
#[test_case(&[Call::Given, Call::And, Call::Then], OrderingError::ThenBeforeWhen; "then after given and")]
#[test_case(&[Call::Given, Call::When, Call::Given], OrderingError::GivenAfterWhenOrThen; "given after when")]
#[test_case(&[Call::When, Call::Then, Call::Given], OrderingError::GivenAfterWhenOrThen; "given after then")]
#[test_case(&[Call::When, Call::Then, Call::When], OrderingError::WhenAfterThen; "when after then")]
#[test_case(&[Call::When, Call::Then, Call::And, Call::When], OrderingError::WhenAfterThen; "when after then and")]
#[test_case(&[Call::And], OrderingError::AndWithoutPrecedingStep; "and first")]
fn test_invalid_orderings_are_rejected(calls: &[Call], expected: OrderingError) {
    let mut scenario = Scenario::new("Test");
    let (last, prefix) = calls.split_last().unwrap();
    for call in prefix {
        append(&mut scenario, *call).unwrap();
    }

    let err = append(&mut scenario, *last).unwrap_err();
    assert_eq!(err.ordering(), Some(expected));
    assert_eq!(err.to_string(), expected.to_string());
}

#[test]
fn test_ordering_error_messages() {
    assert_eq!(
        OrderingError::GivenAfterWhenOrThen.to_string(),
        "Given must come before When and Then steps"
    );
    assert_eq!(OrderingError::WhenAfterThen.to_string(), "When cannot follow Then");
    assert_eq!(OrderingError::ThenBeforeWhen.to_string(), "Then must follow When");
    assert_eq!(
        OrderingError::AndWithoutPrecedingStep.to_string(),
        "And must follow a Given, When, or Then step"
    );
}

#[test]
fn test_and_copies_kind_at_append_time() {
    let mut scenario = Scenario::new("Test");
    scenario.when("action", noop).unwrap().and("more", noop).unwrap();
    scenario.then("result", noop).unwrap();

    let steps = scenario.steps();
    assert_eq!(steps[1].kind, StepKind::When);
    assert_eq!(steps[1].description, "more");
    assert_eq!(steps[2].kind, StepKind::Then);
}

#[tokio::test]
async fn test_login_scenario_runs() {
    let observed = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&observed);

    Scenario::new("User login")
        .given("a user with valid credentials", |ctx| ctx.set("user", "bob"))
        .unwrap()
        .when("the user logs in", |ctx| ctx.set("loggedIn", true))
        .unwrap()
        .then("they see the dashboard", move |ctx| -> anyhow::Result<()> {
            let logged_in = *ctx.get::<bool>("loggedIn")?;
            assert!(logged_in);
            *seen.lock() = Some(logged_in);
            Ok(())
        })
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(*observed.lock(), Some(true));
}

#[tokio::test]
async fn test_steps_execute_in_append_order() {
    let log: Log = Arc::default();
    let mut scenario = Scenario::new("Test");
    scenario
        .given("first", record(&log, "Given1"))
        .unwrap()
        .and("second", record(&log, "Given2"))
        .unwrap()
        .when("action", record(&log, "When"))
        .unwrap()
        .and("another action", record(&log, "When2"))
        .unwrap()
        .then("assertion", record(&log, "Then"))
        .unwrap()
        .and("another assertion", record(&log, "Then2"))
        .unwrap();
    scenario.run().await.unwrap();

    assert_eq!(
        *log.lock(),
        vec!["Given1", "Given2", "When", "When2", "Then", "Then2"]
    );
}

#[tokio::test]
async fn test_async_steps_complete_before_next_starts() {
    let log: Log = Arc::default();
    let slow = Arc::clone(&log);
    let fast = Arc::clone(&log);

    let mut scenario = Scenario::new("Test");
    scenario
        .given_async("slow setup", move |ctx| {
            let log = Arc::clone(&slow);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                ctx.set("ready", true);
                log.lock().push("slow");
                Ok(())
            })
        })
        .unwrap()
        .when("fast action", move |ctx| -> anyhow::Result<()> {
            assert!(*ctx.get::<bool>("ready")?);
            fast.lock().push("fast");
            Ok(())
        })
        .unwrap();
    scenario.run().await.unwrap();

    assert_eq!(*log.lock(), vec!["slow", "fast"]);
}

#[tokio::test]
async fn test_failing_step_aborts_and_wraps_error() {
    let log: Log = Arc::default();
    let mut scenario = Scenario::new("Scenario with error in middle step");
    scenario
        .given("initial setup", record(&log, "given"))
        .unwrap()
        .when("first action", record(&log, "when"))
        .unwrap()
        .and("a second action that throws", |_| -> anyhow::Result<()> {
            anyhow::bail!("boom")
        })
        .unwrap()
        .then("should not reach here", record(&log, "then"))
        .unwrap();

    let err = scenario.run().await.unwrap_err();

    assert_eq!(*log.lock(), vec!["given", "when"]);
    let message = err.to_string();
    assert!(message.contains("Scenario with error in middle step"));
    assert!(message.contains("a second action that throws"));
    assert_eq!(err.source().unwrap().to_string(), "boom");
    assert_eq!(err.step_cause().unwrap().to_string(), "boom");
}

#[tokio::test]
async fn test_failure_message_names_inherited_kind() {
    let mut scenario = Scenario::new("Checkout");
    scenario
        .when("the order is placed", noop)
        .unwrap()
        .and("payment is declined", |_| -> anyhow::Result<()> {
            anyhow::bail!("card declined")
        })
        .unwrap();

    let err = scenario.run().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Scenario 'Checkout' failed at step: When payment is declined"
    );
}

#[tokio::test]
async fn test_original_error_type_is_preserved() {
    let mut scenario = Scenario::new("Test");
    scenario
        .when("read a missing key", |ctx| ctx.get::<String>("missing").map(drop))
        .unwrap();

    let err = scenario.run().await.unwrap_err();
    let cause = err.step_cause().unwrap();
    assert!(matches!(
        cause.downcast_ref::<acceptest_core::ContextError>(),
        Some(acceptest_core::ContextError::MissingKey(key)) if key == "missing"
    ));
}

#[tokio::test]
async fn test_panicking_step_is_a_step_failure() {
    let log: Log = Arc::default();
    let mut scenario = Scenario::new("Assertions");
    scenario
        .when("something happens", noop)
        .unwrap()
        .then("the assertion fails", |_| assert_eq!(1, 2, "values differ"))
        .unwrap()
        .and("never runs", record(&log, "after"))
        .unwrap();

    let err = scenario.run().await.unwrap_err();
    assert!(matches!(err, ScenarioError::StepFailed { .. }));
    assert!(err.to_string().contains("the assertion fails"));
    assert!(err.source().unwrap().to_string().contains("values differ"));
    assert!(log.lock().is_empty());
    assert!(scenario.steps().is_empty());
}

#[tokio::test]
async fn test_context_does_not_leak_between_runs() {
    let leaked = Arc::new(Mutex::new(Vec::new()));

    let mut scenario = Scenario::new("Test");
    for _ in 0..2 {
        let seen = Arc::clone(&leaked);
        scenario
            .given("check empty, then set", move |ctx| {
                seen.lock().push(ctx.contains_key("key") || !ctx.is_empty());
                ctx.set("key", "value");
            })
            .unwrap()
            .when("value exists", |ctx| assert!(ctx.contains_key("key")))
            .unwrap()
            .then("done", noop)
            .unwrap();
        scenario.run().await.unwrap();
    }

    assert_eq!(*leaked.lock(), vec![false, false]);
}

#[tokio::test]
async fn test_context_reset_after_failed_run() {
    let leaked = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&leaked);

    let mut scenario = Scenario::new("Test");
    scenario
        .given("dirty the context", |ctx| ctx.set("stale", 1_u8))
        .unwrap()
        .when("fail", |_| -> anyhow::Result<()> { anyhow::bail!("nope") })
        .unwrap();
    assert!(scenario.run().await.is_err());
    assert!(scenario.steps().is_empty());

    scenario
        .given("inspect", move |ctx| *seen.lock() = Some(ctx.len()))
        .unwrap();
    scenario.run().await.unwrap();

    assert_eq!(*leaked.lock(), Some(0));
}

#[tokio::test]
async fn test_then_first_errors_before_any_step_runs() {
    let mut scenario = Scenario::new("Test");
    let err = scenario.then("x", noop).unwrap_err();
    assert_eq!(err.to_string(), "Then must follow When");
    assert!(scenario.steps().is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_before_next_step() {
    let log: Log = Arc::default();
    let token = CancellationToken::new();
    let trigger = token.clone();

    let mut scenario = Scenario::new("Cancellable");
    scenario
        .given("setup", record(&log, "given"))
        .unwrap()
        .when("cancel the run", move |_| trigger.cancel())
        .unwrap()
        .then("never runs", record(&log, "then"))
        .unwrap();

    let err = scenario.run_with_cancel(&token).await.unwrap_err();
    assert!(matches!(err, ScenarioError::Cancelled { .. }));
    assert!(err.to_string().contains("Then never runs"));
    assert_eq!(*log.lock(), vec!["given"]);
    assert!(scenario.steps().is_empty());
}

#[tokio::test]
async fn test_dropped_run_still_resets() {
    let mut scenario = Scenario::new("Dropped");
    scenario
        .when_async("hangs", |_| Box::pin(futures_pending()))
        .unwrap();

    let timed_out = tokio::time::timeout(Duration::from_millis(20), scenario.run()).await;
    assert!(timed_out.is_err());
    assert!(scenario.steps().is_empty());
    assert_eq!(scenario.last_kind(), None);
}

async fn futures_pending() -> anyhow::Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}

#[tokio::test]
async fn test_sink_receives_labels_and_failure() {
    let sink = MemorySink::new();
    let mut scenario = Scenario::with_sink("User login flow", Arc::new(sink.clone()));
    scenario
        .given("a user with valid credentials", noop)
        .unwrap()
        .and("the user is on the login page", noop)
        .unwrap()
        .when("the user enters their credentials", noop)
        .unwrap()
        .then("login fails", |_| -> anyhow::Result<()> { anyhow::bail!("denied") })
        .unwrap();
    let _ = scenario.run().await;

    let lines = sink.lines();
    assert_eq!(lines[0], "\nScenario: User login flow");
    assert!(lines.contains(&"\nGiven a user with valid credentials".to_string()));
    assert!(lines.contains(&"\n  And the user is on the login page".to_string()));
    assert!(lines.contains(&"\n When the user enters their credentials".to_string()));
    assert!(lines.contains(&"\n Then login fails".to_string()));
    assert_eq!(lines.last().unwrap(), "  Failed");
    assert!(!sink.contains("completed successfully"));
}

#[tokio::test]
async fn test_sink_reports_success_summary() {
    let sink = MemorySink::new();
    let mut scenario = Scenario::with_sink("Short", Arc::new(sink.clone()));
    scenario.when("act", noop).unwrap().then("check", noop).unwrap();
    scenario.run().await.unwrap();

    assert!(sink.contains("Scenario completed successfully with 2 step(s)"));
    assert_eq!(
        sink.lines().iter().filter(|l| l.starts_with("  Completed in")).count(),
        2
    );
}
