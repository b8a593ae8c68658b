//! Use cases - User story orchestration.
//!
//! Each module contains use cases for one wizard concern. The wizards
//! orchestrate the domain rules and the backend ports; the sync protocol
//! owns every multi-request write.

pub mod choices;
pub mod creation;
pub mod level_up;
pub mod step_error;
pub mod sync;

// Re-export main types
pub use choices::{FetchPendingChoices, PendingChoiceList};
pub use creation::{CreationWizard, WizardError};
pub use level_up::{LevelUpError, LevelUpWizard};
pub use step_error::{StepError, StepErrorKind};
pub use sync::SyncProtocol;
