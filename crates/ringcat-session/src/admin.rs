//! Growing-buffer protocol for administrative queries
//!
//! Statistics and prune-list replies are produced by the store into a buffer
//! the caller provides. The store always states up front how large the whole
//! reply is, so a caller whose buffer was too small learns the size it needs
//! and asks again.
//!
//! ```text
//! <declared size>\n<payload>\f
//! ```
//!
//! The declared size counts the complete frame, size field included. A frame
//! whose last byte is the `\f` sentinel arrived whole; anything else was cut
//! short by the store and is shown as-is.

use thiserror::Error;

use crate::session::{LogSession, QueryKind, SessionError};

/// Marks a complete frame
pub const SENTINEL: u8 = b'\x0c';

/// Smallest frame a store can produce: `3\n\f`
const MIN_FRAME_LEN: usize = 3;

#[derive(Debug, Error)]
pub enum AdminQueryError {
    #[error(
        "{kind} reply still does not fit after {attempts} attempts ({declared} bytes declared)"
    )]
    Overflow {
        kind: QueryKind,
        attempts: u32,
        declared: usize,
    },

    #[error("{0} reply does not start with its size")]
    Malformed(QueryKind),

    #[error("{0} reply is empty")]
    Empty(QueryKind),

    #[error("failed to read {kind}")]
    Session {
        kind: QueryKind,
        #[source]
        source: SessionError,
    },
}

/// A parsed administrative reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminFrame {
    /// Size the store said the whole frame needs
    pub declared_size: usize,

    /// The sentinel was missing, so the payload was cut short
    pub truncated: bool,

    /// Reply body, with the size prefix and sentinel removed when complete
    pub payload: Vec<u8>,
}

impl AdminFrame {
    /// Frame `payload` for delivery
    pub fn encode(payload: &[u8]) -> Vec<u8> {
        let body = payload.len() + 2;
        let mut total = body + digit_count(body);
        // Adding the size field can itself add a digit
        while body + digit_count(total) != total {
            total = body + digit_count(total);
        }

        let mut frame = Vec::with_capacity(total);
        frame.extend_from_slice(total.to_string().as_bytes());
        frame.push(b'\n');
        frame.extend_from_slice(payload);
        frame.push(SENTINEL);
        frame
    }

    /// Frame `payload` into `buf`, copying as much as fits and adding a NUL
    /// terminator when there is room for one. Returns the bytes written.
    pub fn write_into(payload: &[u8], buf: &mut [u8]) -> usize {
        let frame = Self::encode(payload);
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        if n < buf.len() {
            buf[n] = 0;
        }
        n
    }

    /// The leading decimal size field, if the reply starts with one
    pub fn declared_size(data: &[u8]) -> Option<usize> {
        let digits = data.iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        std::str::from_utf8(&data[..digits]).ok()?.parse().ok()
    }

    /// Parse a reply that fit in its buffer
    pub fn parse(data: &[u8]) -> Option<Self> {
        let declared_size = Self::declared_size(data)?;
        let end = declared_size.min(data.len());
        let frame = &data[..end];

        let complete = end == declared_size && frame.last() == Some(&SENTINEL);
        if !complete {
            return Some(Self {
                declared_size,
                truncated: true,
                payload: frame.to_vec(),
            });
        }

        let mut start = frame.iter().take_while(|b| b.is_ascii_digit()).count();
        if frame.get(start) == Some(&b'\n') {
            start += 1;
        }
        Some(Self {
            declared_size,
            truncated: false,
            payload: frame[start..end - 1].to_vec(),
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Runs a query, growing the reply buffer until the declared size fits.
///
/// Capacity only grows across attempts. Each attempt's buffer is dropped
/// before the next one is allocated.
#[derive(Clone, Copy, Debug)]
pub struct AdminQuery {
    pub initial_capacity: usize,
    pub max_attempts: u32,
    /// Replies declaring more than this are refused without another attempt
    pub max_capacity: usize,
}

impl Default for AdminQuery {
    fn default() -> Self {
        Self {
            initial_capacity: 8192,
            max_attempts: 32,
            max_capacity: 64 * 1024 * 1024,
        }
    }
}

impl AdminQuery {
    pub fn run<S>(&self, session: &mut S, kind: QueryKind) -> Result<AdminFrame, AdminQueryError>
    where
        S: LogSession + ?Sized,
    {
        let mut capacity = self.initial_capacity.max(MIN_FRAME_LEN + 1);
        let mut declared = 0;

        for attempt in 1..=self.max_attempts {
            let mut buf = vec![0u8; capacity];
            let written = session
                .query(kind, &mut buf)
                .map_err(|source| AdminQueryError::Session { kind, source })?
                .min(capacity);

            declared = AdminFrame::declared_size(&buf[..written])
                .ok_or(AdminQueryError::Malformed(kind))?;
            if declared < MIN_FRAME_LEN {
                return Err(AdminQueryError::Empty(kind));
            }

            if declared < capacity {
                tracing::debug!(%kind, attempt, capacity, declared, "admin reply fit");
                return AdminFrame::parse(&buf[..written]).ok_or(AdminQueryError::Malformed(kind));
            }

            let grown = capacity.saturating_mul(2).max(declared.saturating_add(1));
            if declared >= self.max_capacity || grown > self.max_capacity {
                return Err(AdminQueryError::Overflow {
                    kind,
                    attempts: attempt,
                    declared,
                });
            }
            tracing::debug!(%kind, attempt, capacity, grown, "admin reply too large, retrying");
            capacity = grown;
        }

        Err(AdminQueryError::Overflow {
            kind,
            attempts: self.max_attempts,
            declared,
        })
    }
}

fn digit_count(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        digits += 1;
        n /= 10;
    }
    digits
}
