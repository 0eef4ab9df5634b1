//! Shared value types: grid positions, placed world objects, player ids.
//!
//! # Invariants
//! - Positions compare by all three coordinates.
//! - World objects compare by full value, never by position alone.

mod object;
mod types;

pub use object::{Face, ObjectError, ObjectKind, WorldObject};
pub use types::{PlayerId, Position};
