use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use ringcat_types::{EventValue, LogEntry, LogPriority, LogRecord};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("tag is not NUL-terminated")]
    UnterminatedTag,

    #[error("event payload is shorter than its tag")]
    ShortEvent,

    #[error("undecodable event value")]
    BadEventValue,
}

/// Names for numeric event tags, read from an event-log-tags file
#[derive(Clone, Debug, Default)]
pub struct EventTagMap {
    tags: HashMap<u32, String>,
}

impl EventTagMap {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    /// Parse lines of the form `<number> <name> [description]`.
    /// Comments and lines that don't fit are skipped.
    pub fn parse(text: &str) -> Self {
        let mut tags = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(number), Some(name)) = (fields.next(), fields.next()) else {
                continue;
            };
            match number.parse::<u32>() {
                Ok(number) => {
                    tags.insert(number, name.to_string());
                }
                Err(_) => tracing::debug!(line, "skipping malformed event tag line"),
            }
        }
        Self { tags }
    }

    pub fn get(&self, tag: u32) -> Option<&str> {
        self.tags.get(&tag).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Turns records into entries. Holds the event tag map, if one was loaded,
/// for the life of the session.
#[derive(Clone, Debug, Default)]
pub struct RecordDecoder {
    tag_map: Option<EventTagMap>,
}

impl RecordDecoder {
    pub fn new(tag_map: Option<EventTagMap>) -> Self {
        Self { tag_map }
    }

    pub fn decode(&self, record: &LogRecord, binary: bool) -> Result<LogEntry, DecodeError> {
        if binary {
            self.decode_event(record)
        } else {
            decode_text(record)
        }
    }

    fn decode_event(&self, record: &LogRecord) -> Result<LogEntry, DecodeError> {
        let payload = record.payload();
        let raw: [u8; 4] = payload
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or(DecodeError::ShortEvent)?;
        let tag = u32::from_le_bytes(raw);

        let tag_name = self
            .tag_map
            .as_ref()
            .and_then(|map| map.get(tag))
            .map(str::to_string)
            .unwrap_or_else(|| format!("[{tag}]"));

        let (value, _) = EventValue::decode(&payload[4..]).ok_or(DecodeError::BadEventValue)?;

        Ok(LogEntry::new(
            record.header(),
            LogPriority::Info,
            tag_name,
            value.to_string(),
        ))
    }
}

fn decode_text(record: &LogRecord) -> Result<LogEntry, DecodeError> {
    let (&priority, rest) = record.payload().split_first().ok_or(DecodeError::Empty)?;
    let tag_end = rest
        .iter()
        .position(|b| *b == 0)
        .ok_or(DecodeError::UnterminatedTag)?;
    let tag = String::from_utf8_lossy(&rest[..tag_end]).into_owned();

    let body = &rest[tag_end + 1..];
    let message_end = body.iter().position(|b| *b == 0).unwrap_or(body.len());
    let message = String::from_utf8_lossy(&body[..message_end]).into_owned();

    Ok(LogEntry::new(
        record.header(),
        LogPriority::from_wire(priority),
        tag,
        message,
    ))
}
