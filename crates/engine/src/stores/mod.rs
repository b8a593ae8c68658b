//! In-memory state storage modules.
//!
//! Stores manage runtime state that belongs to one wizard session:
//! - `SaveLock` - blocks a second confirm while a save is in flight

pub mod save_lock;

pub use save_lock::{SaveGuard, SaveLock};
