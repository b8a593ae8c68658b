//! Level-up wizard errors.

use charwright_domain::{DomainError, LevelUpStep};

use crate::infrastructure::ports::ApiError;

/// Errors that can occur while driving a level-up.
#[derive(Debug, thiserror::Error)]
pub enum LevelUpError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("A save is already in progress")]
    SaveInFlight,

    #[error("No level-up in progress")]
    NotStarted,

    #[error("Not on step {0}")]
    WrongStep(LevelUpStep),

    #[error("Step {0} has incomplete choices")]
    StepIncomplete(LevelUpStep),

    #[error("No pending choice {0} on this step")]
    UnknownChoice(String),
}
