//! mkfsvol shared code.
//!
//! This crate contains the error types, constants and volume-plugin wire
//! types used by both the core driver (mkfsvol) and the plugin server
//! (mkfsvol-cli).

pub mod constants;
pub mod errors;
pub mod protocol;

pub use errors::{ProcessError, ProcessFailure, VolumeError, VolumeResult};
