//! # Domain Models
//!
//! Pure data shared by every `DeployHub` crate (`serde`, `bitflags` only):
//! processing phases, the enabled subsystem set, deployment events and the
//! server configuration tree. No I/O and no runtime state lives here.

pub mod config;
pub mod events;
pub mod phase;
pub mod subsystems;

pub use phase::Phase;
pub use subsystems::SubsystemSet;
