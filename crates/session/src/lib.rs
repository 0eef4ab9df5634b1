//! Sessions: in-process stand-ins for connected clients.
//!
//! # Invariants
//! - Notifying a session never blocks; updates queue on the session's own
//!   outbound channel until the network layer drains them.
//! - The directory hands the registry only occupied slots.

mod directory;
mod session;

pub use directory::{DirectoryError, SlotDirectory};
pub use session::{ObjectUpdate, Session, UpdateReceiver, drain};
