//! Creation wizard errors.

use charwright_domain::{CreationStep, DomainError};

use crate::infrastructure::ports::ApiError;

/// Errors that can occur while driving the creation wizard.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    /// A save is already running for this wizard.
    #[error("A save is already in progress")]
    SaveInFlight,

    #[error("No character has been created yet")]
    NoCharacter,

    #[error("Step {0} has incomplete choices")]
    StepIncomplete(CreationStep),

    #[error("Step {0} is not reachable yet")]
    WrongStep(CreationStep),

    #[error("No pending choice {0} on this step")]
    UnknownChoice(String),
}
