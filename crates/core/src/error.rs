//! Error types for the scenario engine

use thiserror::Error;

/// Raised while appending a step out of Given -> When -> Then order.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingError {
    #[error("Given must come before When and Then steps")]
    GivenAfterWhenOrThen,

    #[error("When cannot follow Then")]
    WhenAfterThen,

    #[error("Then must follow When")]
    ThenBeforeWhen,

    #[error("And must follow a Given, When, or Then step")]
    AndWithoutPrecedingStep,
}

/// Typed access to the shared context failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Context key not found: {0}")]
    MissingKey(String),

    #[error("Context key '{key}' holds {actual}, not {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error(transparent)]
    Ordering(#[from] OrderingError),

    #[error("Scenario '{scenario}' failed at step: {step}")]
    StepFailed {
        scenario: String,
        step: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Scenario '{scenario}' cancelled before step: {step}")]
    Cancelled { scenario: String, step: String },
}

impl ScenarioError {
    /// The ordering error, if this is one
    pub fn ordering(&self) -> Option<OrderingError> {
        match self {
            ScenarioError::Ordering(e) => Some(*e),
            _ => None,
        }
    }

    /// The error the failing step action produced
    pub fn step_cause(&self) -> Option<&anyhow::Error> {
        match self {
            ScenarioError::StepFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
