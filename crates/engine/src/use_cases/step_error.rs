//! Per-step error signal shown next to the step that failed.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepErrorKind {
    /// Recoverable by retrying; local picks are kept.
    Network,
    /// The step's input was rejected.
    Validation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepError<S> {
    pub step: S,
    pub kind: StepErrorKind,
    pub message: String,
}

impl<S> StepError<S> {
    pub fn network(step: S, error: &impl fmt::Display) -> Self {
        Self {
            step,
            kind: StepErrorKind::Network,
            message: error.to_string(),
        }
    }

    pub fn validation(step: S, message: impl Into<String>) -> Self {
        Self {
            step,
            kind: StepErrorKind::Validation,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == StepErrorKind::Network
    }
}

impl<S: fmt::Display> fmt::Display for StepError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.message)
    }
}
