//! World Kernel: the authoritative registry of placed world objects and the
//! fan-out that keeps each connected client's view of them current.
//!
//! # Invariants
//! - At most one object occupies any position.
//! - All mutations flow through [`ObjectRegistry`]; callers only ever see snapshots.
//! - Every scan-and-notify pass runs under the registry lock, so fan-out never
//!   observes a half-applied mutation.

pub mod config;
pub mod registry;
pub mod viewer;

pub use config::{ConfigError, RegistryConfig};
pub use registry::{ObjectRegistry, RegistryError};
pub use viewer::{PlayerDirectory, Viewer};
