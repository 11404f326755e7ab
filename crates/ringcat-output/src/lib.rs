//! Output handling for ringcat
//!
//! This crate owns the output destination, rotates file output into a
//! bounded numbered backlog, and parses and formats human-readable sizes.

mod rotation;
mod sink;
mod size;

pub use rotation::{RenameFailure, Rotation, RotationConfig};
pub use sink::{OutputSink, SinkError};
pub use size::{HumanSize, SizeParseError, decompose, parse_size};
