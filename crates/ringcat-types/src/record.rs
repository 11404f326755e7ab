//! Binary record framing
//!
//! Every record starts with a fixed little-endian header whose first field is
//! the payload length, so a reader always knows how many bytes to forward.
//!
//! ```text
//! 0      2         4     8     12    16     20    24
//! | len  | hdr_size | pid | tid | sec | nsec | lid | payload ...
//! ```

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use crate::{LogId, LogPriority};

/// Size of the header written by this crate
pub const HEADER_SIZE: usize = 24;

/// Largest payload a single record may carry
pub const MAX_PAYLOAD_LEN: usize = 4068;

/// Largest record, header included, a reader has to accept
pub const MAX_ENTRY_LEN: usize = 5 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record truncated: have {have} bytes, need {need}")]
    Truncated { have: usize, need: usize },

    #[error("record has {0} bytes past its announced length")]
    TrailingBytes(usize),

    #[error("record header size {0} is below the minimum of {HEADER_SIZE}")]
    BadHeaderSize(u16),

    #[error("record payload of {0} bytes exceeds the maximum of {MAX_PAYLOAD_LEN}")]
    PayloadTooLarge(usize),

    #[error("record of {0} bytes exceeds the maximum entry size of {MAX_ENTRY_LEN}")]
    EntryTooLarge(usize),
}

/// Decoded fixed header of a record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub payload_len: u16,
    pub hdr_size: u16,
    pub pid: i32,
    pub tid: u32,
    pub sec: u32,
    pub nsec: u32,
    /// Wire source id (see [`LogId::as_raw`])
    pub lid: u32,
}

impl RecordHeader {
    /// Total frame length announced by the first four bytes of a record.
    ///
    /// Used by stream readers to know how much more to read before the
    /// record is complete.
    pub fn frame_len(prefix: [u8; 4]) -> Result<usize, RecordError> {
        let payload_len = u16::from_le_bytes([prefix[0], prefix[1]]) as usize;
        let hdr_size = u16::from_le_bytes([prefix[2], prefix[3]]);
        if (hdr_size as usize) < HEADER_SIZE {
            return Err(RecordError::BadHeaderSize(hdr_size));
        }
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(RecordError::PayloadTooLarge(payload_len));
        }
        let total = hdr_size as usize + payload_len;
        if total > MAX_ENTRY_LEN {
            return Err(RecordError::EntryTooLarge(total));
        }
        Ok(total)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() < HEADER_SIZE {
            return Err(RecordError::Truncated {
                have: bytes.len(),
                need: HEADER_SIZE,
            });
        }
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        let header = Self {
            payload_len: u16_at(0),
            hdr_size: u16_at(2),
            pid: u32_at(4) as i32,
            tid: u32_at(8),
            sec: u32_at(12),
            nsec: u32_at(16),
            lid: u32_at(20),
        };
        Self::frame_len([bytes[0], bytes[1], bytes[2], bytes[3]])?;
        Ok(header)
    }

    /// Header plus payload length
    pub fn record_len(&self) -> usize {
        self.hdr_size as usize + self.payload_len as usize
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.sec as i64, self.nsec)
            .single()
            .unwrap_or_default()
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.payload_len.to_le_bytes());
        out.extend_from_slice(&self.hdr_size.to_le_bytes());
        out.extend_from_slice(&self.pid.to_le_bytes());
        out.extend_from_slice(&self.tid.to_le_bytes());
        out.extend_from_slice(&self.sec.to_le_bytes());
        out.extend_from_slice(&self.nsec.to_le_bytes());
        out.extend_from_slice(&self.lid.to_le_bytes());
    }
}

/// One complete record as delivered by a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    header: RecordHeader,
    bytes: Vec<u8>,
}

impl LogRecord {
    /// Validate a complete frame. Trailing bytes past the announced length
    /// are rejected along with short frames.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, RecordError> {
        let header = RecordHeader::parse(&bytes)?;
        let need = header.record_len();
        if bytes.len() < need {
            return Err(RecordError::Truncated {
                have: bytes.len(),
                need,
            });
        }
        if bytes.len() > need {
            return Err(RecordError::TrailingBytes(bytes.len() - need));
        }
        Ok(Self { header, bytes })
    }

    pub fn builder(id: LogId) -> RecordBuilder {
        RecordBuilder::new(id.as_raw())
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// Wire source id
    pub fn source(&self) -> u32 {
        self.header.lid
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.header.hdr_size as usize..]
    }

    /// The complete frame, header included
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Builds well-formed records, mostly for producers and tests
#[derive(Clone, Debug)]
pub struct RecordBuilder {
    lid: u32,
    pid: i32,
    tid: u32,
    sec: u32,
    nsec: u32,
}

impl RecordBuilder {
    /// Start a record for a raw source id, including ids no [`LogId`] names
    pub fn new(lid: u32) -> Self {
        Self {
            lid,
            pid: 0,
            tid: 0,
            sec: 0,
            nsec: 0,
        }
    }

    pub fn pid(mut self, pid: i32) -> Self {
        self.pid = pid;
        self
    }

    pub fn tid(mut self, tid: u32) -> Self {
        self.tid = tid;
        self
    }

    pub fn time(mut self, sec: u32, nsec: u32) -> Self {
        self.sec = sec;
        self.nsec = nsec;
        self
    }

    /// Text payload: priority byte, NUL-terminated tag, NUL-terminated message
    pub fn text(
        self,
        priority: LogPriority,
        tag: &str,
        message: &str,
    ) -> Result<LogRecord, RecordError> {
        let mut payload = Vec::with_capacity(tag.len() + message.len() + 3);
        payload.push(priority.as_wire());
        payload.extend_from_slice(tag.as_bytes());
        payload.push(0);
        payload.extend_from_slice(message.as_bytes());
        payload.push(0);
        self.finish(payload)
    }

    /// Binary event payload: numeric tag followed by one typed value
    pub fn event(self, tag: u32, value: &EventValue) -> Result<LogRecord, RecordError> {
        let mut payload = tag.to_le_bytes().to_vec();
        value.encode(&mut payload);
        self.finish(payload)
    }

    fn finish(self, payload: Vec<u8>) -> Result<LogRecord, RecordError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(RecordError::PayloadTooLarge(payload.len()));
        }
        let header = RecordHeader {
            payload_len: payload.len() as u16,
            hdr_size: HEADER_SIZE as u16,
            pid: self.pid,
            tid: self.tid,
            sec: self.sec,
            nsec: self.nsec,
            lid: self.lid,
        };
        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        header.write_to(&mut bytes);
        bytes.extend_from_slice(&payload);
        Ok(LogRecord { header, bytes })
    }
}

/// Typed value carried by a binary event record
#[derive(Clone, Debug, PartialEq)]
pub enum EventValue {
    Int(i32),
    Long(i64),
    String(String),
    List(Vec<EventValue>),
    Float(f32),
}

impl EventValue {
    const INT: u8 = 0;
    const LONG: u8 = 1;
    const STRING: u8 = 2;
    const LIST: u8 = 3;
    const FLOAT: u8 = 4;

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Int(v) => {
                out.push(Self::INT);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Self::Long(v) => {
                out.push(Self::LONG);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Self::String(s) => {
                out.push(Self::STRING);
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Self::List(items) => {
                out.push(Self::LIST);
                out.push(items.len() as u8);
                for item in items {
                    item.encode(out);
                }
            }
            Self::Float(v) => {
                out.push(Self::FLOAT);
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    /// Decode one value from the front of `bytes`, returning it with the
    /// number of bytes consumed. `None` on a short or unknown encoding.
    pub fn decode(bytes: &[u8]) -> Option<(Self, usize)> {
        let (&kind, rest) = bytes.split_first()?;
        match kind {
            Self::INT => {
                let raw: [u8; 4] = rest.get(..4)?.try_into().ok()?;
                Some((Self::Int(i32::from_le_bytes(raw)), 5))
            }
            Self::LONG => {
                let raw: [u8; 8] = rest.get(..8)?.try_into().ok()?;
                Some((Self::Long(i64::from_le_bytes(raw)), 9))
            }
            Self::STRING => {
                let raw: [u8; 4] = rest.get(..4)?.try_into().ok()?;
                let len = u32::from_le_bytes(raw) as usize;
                let text = rest.get(4..4 + len)?;
                Some((
                    Self::String(String::from_utf8_lossy(text).into_owned()),
                    5 + len,
                ))
            }
            Self::LIST => {
                let count = *rest.first()? as usize;
                let mut used = 2;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    let (item, n) = Self::decode(bytes.get(used..)?)?;
                    items.push(item);
                    used += n;
                }
                Some((Self::List(items), used))
            }
            Self::FLOAT => {
                let raw: [u8; 4] = rest.get(..4)?.try_into().ok()?;
                Some((Self::Float(f32::from_le_bytes(raw)), 5))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for EventValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
            Self::Float(v) => write!(f, "{v}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}
