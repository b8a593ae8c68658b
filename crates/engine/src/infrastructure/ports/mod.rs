//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - The character record and its sub-resources (could swap REST -> in-memory)
//! - Compendium reference data

mod api;
mod error;

pub use api::{ChoiceResolution, CharacterApi, CompendiumApi};
pub use error::ApiError;

#[cfg(test)]
pub use api::{MockCharacterApi, MockCompendiumApi};
