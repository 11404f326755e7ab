//! Shared types for ringcat
//!
//! This crate contains the record wire format and the data structures used
//! across multiple ringcat crates.

mod record;

use chrono::{DateTime, TimeZone, Utc};

pub use record::{
    EventValue, HEADER_SIZE, LogRecord, MAX_ENTRY_LEN, MAX_PAYLOAD_LEN, RecordBuilder,
    RecordError, RecordHeader,
};

// ============================================================================
// Log Sources
// ============================================================================

/// A daemon-held ring buffer that records can be read from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogId {
    Main,
    Radio,
    Events,
    System,
    Crash,
}

impl LogId {
    /// Every known buffer, in source id order
    pub const ALL: [LogId; 5] = [
        LogId::Main,
        LogId::Radio,
        LogId::Events,
        LogId::System,
        LogId::Crash,
    ];

    /// Buffers read when none are requested explicitly
    pub const DEFAULTS: [LogId; 3] = [LogId::Main, LogId::System, LogId::Crash];

    /// Map a wire source id to a known buffer
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Main),
            1 => Some(Self::Radio),
            2 => Some(Self::Events),
            3 => Some(Self::System),
            4 => Some(Self::Crash),
            _ => None,
        }
    }

    /// Source id as carried in the record header
    pub fn as_raw(&self) -> u32 {
        match self {
            Self::Main => 0,
            Self::Radio => 1,
            Self::Events => 2,
            Self::System => 3,
            Self::Crash => 4,
        }
    }

    /// Look a buffer up by its command-line name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Radio => "radio",
            Self::Events => "events",
            Self::System => "system",
            Self::Crash => "crash",
        }
    }

    /// Whether records in this buffer carry binary event payloads
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Events)
    }
}

impl std::fmt::Display for LogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Priorities
// ============================================================================

/// Record priority, ordered from least to most severe
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogPriority {
    #[default]
    Unknown,
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Silent,
}

impl LogPriority {
    /// Parse the priority byte stored at the start of a text payload
    pub fn from_wire(value: u8) -> Self {
        match value {
            2 => Self::Verbose,
            3 => Self::Debug,
            4 => Self::Info,
            5 => Self::Warn,
            6 => Self::Error,
            7 => Self::Fatal,
            8 => Self::Silent,
            _ => Self::Unknown,
        }
    }

    pub fn as_wire(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Verbose => 2,
            Self::Debug => 3,
            Self::Info => 4,
            Self::Warn => 5,
            Self::Error => 6,
            Self::Fatal => 7,
            Self::Silent => 8,
        }
    }

    /// Parse the single-letter form used in filterspecs (case-insensitive)
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'V' => Some(Self::Verbose),
            'D' => Some(Self::Debug),
            'I' => Some(Self::Info),
            'W' => Some(Self::Warn),
            'E' => Some(Self::Error),
            'F' => Some(Self::Fatal),
            'S' => Some(Self::Silent),
            _ => None,
        }
    }

    /// Single-letter display form
    pub fn as_char(&self) -> char {
        match self {
            Self::Unknown => '?',
            Self::Verbose => 'V',
            Self::Debug => 'D',
            Self::Info => 'I',
            Self::Warn => 'W',
            Self::Error => 'E',
            Self::Fatal => 'F',
            Self::Silent => 'S',
        }
    }
}

// ============================================================================
// Decoded Entries
// ============================================================================

/// A record decoded into displayable fields
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    /// Wire source id the record arrived on
    pub source: u32,

    pub priority: LogPriority,

    /// Component tag (event tag name for binary buffers)
    pub tag: String,

    pub message: String,

    pub pid: i32,

    pub tid: u32,

    /// Time the record was logged
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Create an entry stamped with the header fields of `header`
    pub fn new(header: &RecordHeader, priority: LogPriority, tag: String, message: String) -> Self {
        Self {
            source: header.lid,
            priority,
            tag,
            message,
            pid: header.pid,
            tid: header.tid,
            timestamp: header.timestamp(),
        }
    }

    /// Entry with no header information, used for synthetic lines
    pub fn bare(priority: LogPriority, tag: &str, message: &str) -> Self {
        Self {
            source: 0,
            priority,
            tag: tag.to_string(),
            message: message.to_string(),
            pid: 0,
            tid: 0,
            timestamp: Utc.timestamp_opt(0, 0).single().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_id_names_round_trip() {
        for id in LogId::ALL {
            assert_eq!(LogId::from_name(id.name()), Some(id));
            assert_eq!(LogId::from_raw(id.as_raw()), Some(id));
        }
        assert_eq!(LogId::from_name("kernel"), None);
        assert_eq!(LogId::from_raw(7), None);
    }

    #[test]
    fn test_only_events_is_binary() {
        let binary: Vec<_> = LogId::ALL.into_iter().filter(|id| id.is_binary()).collect();
        assert_eq!(binary, vec![LogId::Events]);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(LogPriority::Verbose < LogPriority::Debug);
        assert!(LogPriority::Error < LogPriority::Fatal);
        assert!(LogPriority::Fatal < LogPriority::Silent);
        assert_eq!(LogPriority::from_char('w'), Some(LogPriority::Warn));
        assert_eq!(LogPriority::from_char('x'), None);
        assert_eq!(LogPriority::from_wire(6), LogPriority::Error);
        assert_eq!(LogPriority::from_wire(42), LogPriority::Unknown);
    }
}
