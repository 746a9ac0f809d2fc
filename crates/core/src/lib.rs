//! Acceptest Scenario Engine
//!
//! A fluent Given/When/Then builder that validates step ordering as steps are
//! appended, and a runner that executes them one at a time against a shared
//! context.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Scenario                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Builder                                                    │
//! │    ├── given / when / then / and (+ *_async)                │
//! │    ├── phase::validate(phase, next) -> Phase                │
//! │    └── steps: [Step { kind, description, action }]          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Runner                                                     │
//! │    ├── run() / run_with_cancel(token)                       │
//! │    ├── ScenarioContext (String -> Any) shared by all steps  │
//! │    └── ScenarioSink (labels, timings, failures)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```no_run
//! # async fn demo() -> Result<(), acceptest_core::ScenarioError> {
//! use acceptest_core::Scenario;
//!
//! Scenario::new("user login")
//!     .given("a user with valid credentials", |ctx| ctx.set("user", "bob"))?
//!     .when("the user logs in", |ctx| ctx.set("logged_in", true))?
//!     .then("they see the dashboard", |ctx| -> anyhow::Result<()> {
//!         assert!(*ctx.get::<bool>("logged_in")?);
//!         Ok(())
//!     })?
//!     .run()
//!     .await
//! # }
//! ```

pub mod context;
pub mod error;
pub mod phase;
pub mod scenario;
pub mod sink;

pub use context::ScenarioContext;
pub use error::{ContextError, OrderingError, ScenarioError};
pub use phase::{Phase, StepKind};
pub use scenario::{Scenario, StepAction, StepInfo, StepOutcome};
pub use sink::{MemorySink, NullSink, ScenarioSink, TracingSink, WriterSink};
