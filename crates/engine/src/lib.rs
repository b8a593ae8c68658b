//! Charwright Engine library.
//!
//! Drives character creation and level-up against a rules backend.
//!
//! ## Structure
//!
//! - `use_cases/` - The two wizards, pending choice fetching and the sync protocol
//! - `stores/` - Per-session runtime state
//! - `infrastructure/` - Backend ports, the HTTP adapter and the in-memory backend

pub mod infrastructure;
pub mod stores;
pub mod use_cases;

/// Test fixtures shared by the use case tests.
#[cfg(test)]
pub mod test_fixtures;

pub use use_cases::{CreationWizard, LevelUpWizard};
