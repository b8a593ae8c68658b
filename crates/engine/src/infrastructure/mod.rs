//! Infrastructure implementations.
//!
//! Contains port trait implementations for the rules backend.

pub mod config;
pub mod in_memory;
pub mod ports;
pub mod retry;
pub mod rules_api;
