//! Step kinds and the phase ordering table

use std::fmt;

use crate::error::OrderingError;

/// The BDD kind a step is tagged with when it is appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Given,
    When,
    Then,
}

impl StepKind {
    /// Keyword as written in a scenario
    pub fn keyword(&self) -> &'static str {
        match self {
            StepKind::Given => "Given",
            StepKind::When => "When",
            StepKind::Then => "Then",
        }
    }

    /// Label used for the first step of a run of same-kind steps.
    /// Padded so the keywords line up with "  And".
    fn padded_keyword(&self) -> &'static str {
        match self {
            StepKind::Given => "Given",
            StepKind::When => " When",
            StepKind::Then => " Then",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Furthest phase a scenario has reached while being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    None,
    Given,
    When,
    Then,
}

impl From<StepKind> for Phase {
    fn from(kind: StepKind) -> Self {
        match kind {
            StepKind::Given => Phase::Given,
            StepKind::When => Phase::When,
            StepKind::Then => Phase::Then,
        }
    }
}

/// Validate appending a step of `next` kind while the cursor is at `current`.
///
/// Returns the new phase cursor on success:
///
/// | current | Given | When  | Then  |
/// |---------|-------|-------|-------|
/// | None    | Given | When  | error |
/// | Given   | Given | When  | error |
/// | When    | error | When  | Then  |
/// | Then    | error | error | Then  |
pub fn validate(current: Phase, next: StepKind) -> Result<Phase, OrderingError> {
    match (next, current) {
        (StepKind::Given, Phase::None | Phase::Given) => Ok(Phase::Given),
        (StepKind::Given, _) => Err(OrderingError::GivenAfterWhenOrThen),

        (StepKind::When, Phase::None | Phase::Given | Phase::When) => Ok(Phase::When),
        (StepKind::When, Phase::Then) => Err(OrderingError::WhenAfterThen),

        (StepKind::Then, Phase::When | Phase::Then) => Ok(Phase::Then),
        (StepKind::Then, _) => Err(OrderingError::ThenBeforeWhen),
    }
}

/// Display label for the step at `index` in an ordered list of step kinds.
///
/// A step whose predecessor has the same kind is shown as "  And"; anything
/// else shows its padded keyword. Purely cosmetic.
pub fn step_prefix(kinds: &[StepKind], index: usize) -> &'static str {
    let kind = kinds[index];
    if index > 0 && kinds[index - 1] == kind {
        "  And"
    } else {
        kind.padded_keyword()
    }
}
