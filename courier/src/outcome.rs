use crate::errors::ErrorClass;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a delivery attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The chat or send affordance never became ready.
    TimedOut,
    /// An expected element is missing; the remote interface changed shape.
    ElementMissing,
    /// Anything else, including cancellation.
    Unexpected,
}

impl From<ErrorClass> for FailureKind {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::Timing => FailureKind::TimedOut,
            ErrorClass::Structural => FailureKind::ElementMissing,
            ErrorClass::Unclassified => FailureKind::Unexpected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// The result of processing one contact. Created once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Skipped(String),
    Failed(Failure),
}

impl AttemptOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            AttemptOutcome::Success => OutcomeKind::Success,
            AttemptOutcome::Skipped(_) => OutcomeKind::Skipped,
            AttemptOutcome::Failed(_) => OutcomeKind::Failed,
        }
    }

    /// Empty for a success
    pub fn reason(&self) -> &str {
        match self {
            AttemptOutcome::Success => "",
            AttemptOutcome::Skipped(reason) => reason,
            AttemptOutcome::Failed(failure) => &failure.reason,
        }
    }

    pub fn is_structural_failure(&self) -> bool {
        matches!(
            self,
            AttemptOutcome::Failed(Failure {
                kind: FailureKind::ElementMissing,
                ..
            })
        )
    }
}

/// The `Status` column of the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    Success,
    Skipped,
    Failed,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeKind::Success => "Success",
            OutcomeKind::Skipped => "Skipped",
            OutcomeKind::Failed => "Failed",
        };
        f.write_str(s)
    }
}
