//! Log store sessions for ringcat
//!
//! This crate provides the session interface used to read interleaved
//! records and run administrative operations against a log store, the
//! growing-buffer protocol for variable-length administrative replies, and a
//! file-backed store.

mod admin;
mod file;
mod session;

pub use admin::{AdminFrame, AdminQuery, AdminQueryError, SENTINEL};
pub use file::FileSession;
pub use session::{
    LogSession, QueryKind, ReadMode, ReadOutcome, SessionError, SessionOptions, Tail,
};

// Re-export types used in our public API
pub use ringcat_types::{LogId, LogRecord};
