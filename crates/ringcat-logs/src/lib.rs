//! Log processing for ringcat
//!
//! This crate tracks the buffers records come from, decodes and filters
//! records, formats them into lines, and drives the multiplexed read loop.

mod decode;
mod filter;
mod format;
mod sources;
mod stream;

pub use decode::{DecodeError, EventTagMap, RecordDecoder};
pub use filter::{FilterError, FilterRules};
pub use format::{LineFormat, LinePrinter};
pub use sources::{Source, SourceError, SourceRef, SourceSet};
pub use stream::{ReadError, ReadLoop, ReadOptions, ReadSummary};

// Re-export types used in our public API
pub use ringcat_types::{LogEntry, LogId, LogPriority};
