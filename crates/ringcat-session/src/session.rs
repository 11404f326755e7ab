use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use ringcat_types::{LogId, LogRecord, RecordError};

/// How a read behaves when no record is available yet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Wait for more records
    #[default]
    Blocking,
    /// Report [`ReadOutcome::NoData`] at the current end of the log
    NonBlocking,
}

/// Which historical records a session starts with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tail {
    /// Everything the store holds
    #[default]
    All,
    /// Only the most recent `n` records present when the session opens
    Lines(usize),
    /// Only records logged at or after the given time
    Since(DateTime<Utc>),
}

/// Parameters for opening a session
#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    pub mode: ReadMode,
    pub tail: Tail,
    /// Buffers to deliver records from
    pub sources: Vec<LogId>,
}

/// Result of a single read
#[derive(Debug)]
pub enum ReadOutcome {
    Record(LogRecord),
    /// Nothing available right now (non-blocking mode only)
    NoData,
    /// The session ended without delivering a record or an error
    Eof,
}

/// Administrative queries whose response size is not known in advance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    Statistics,
    PruneList,
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Statistics => f.write_str("statistics"),
            Self::PruneList => f.write_str("prune list"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unable to open log store {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unexpected length: {0}")]
    Malformed(#[from] RecordError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0} is not supported by this log store")]
    Unsupported(&'static str),
}

/// A connection to the ring buffers of a log store.
///
/// Reads deliver records from every requested buffer interleaved in store
/// order. The administrative operations default to
/// [`SessionError::Unsupported`] so read-only stores only implement
/// [`LogSession::read_next`].
pub trait LogSession {
    fn read_next(&mut self) -> Result<ReadOutcome, SessionError>;

    fn clear(&mut self, id: LogId) -> Result<(), SessionError> {
        let _ = id;
        Err(SessionError::Unsupported("clearing a buffer"))
    }

    /// Configured capacity of a buffer in bytes
    fn ring_size(&mut self, id: LogId) -> Result<u64, SessionError> {
        let _ = id;
        Err(SessionError::Unsupported("reading the ring buffer size"))
    }

    /// Bytes currently held by a buffer
    fn readable_size(&mut self, id: LogId) -> Result<u64, SessionError> {
        let _ = id;
        Err(SessionError::Unsupported("reading the consumed size"))
    }

    fn set_ring_size(&mut self, id: LogId, bytes: u64) -> Result<(), SessionError> {
        let _ = (id, bytes);
        Err(SessionError::Unsupported("setting the ring buffer size"))
    }

    fn set_prune_list(&mut self, list: &str) -> Result<(), SessionError> {
        let _ = list;
        Err(SessionError::Unsupported("setting the prune list"))
    }

    /// Write a framed response for `kind` into `buf`, returning the number of
    /// bytes written. See [`crate::AdminFrame`] for the framing.
    fn query(&mut self, kind: QueryKind, buf: &mut [u8]) -> Result<usize, SessionError> {
        let _ = buf;
        Err(SessionError::Unsupported(match kind {
            QueryKind::Statistics => "reading statistics",
            QueryKind::PruneList => "reading the prune list",
        }))
    }
}
