use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::rotation::{Rotation, RotationConfig};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("couldn't open output file {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("couldn't reopen output file {path} after rotation")]
    Reopen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("output error")]
    Write(#[source] io::Error),

    /// The reader on the other end went away
    #[error("output pipe closed")]
    BrokenPipe,
}

impl SinkError {
    fn from_write(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::BrokenPipe {
            Self::BrokenPipe
        } else {
            Self::Write(err)
        }
    }
}

enum Destination {
    /// Standard output or any other stream; never rotated
    Stream(Box<dyn Write>),

    File {
        /// `None` only between closing and reopening during a rotation
        file: Option<File>,
        rotation: Rotation,
    },
}

/// Single owner of the live output destination.
///
/// Counts every byte written and, for file destinations with a rotation
/// threshold, rotates once the count reaches the threshold. The write that
/// crosses the threshold lands in the old file.
pub struct OutputSink {
    destination: Destination,
    bytes_written: u64,
    threshold: Option<u64>,
    rotations: u64,
}

impl OutputSink {
    pub fn stdout() -> Self {
        Self::stream(Box::new(io::stdout()))
    }

    /// Write to an arbitrary stream. Streams never rotate.
    pub fn stream(writer: Box<dyn Write>) -> Self {
        Self {
            destination: Destination::Stream(writer),
            bytes_written: 0,
            threshold: None,
            rotations: 0,
        }
    }

    /// Open `path` for append, creating it if needed. The byte count starts
    /// at the size of whatever the file already holds.
    pub fn file(path: impl Into<PathBuf>, config: RotationConfig) -> Result<Self, SinkError> {
        let path = path.into();
        let file = open_append(&path).map_err(|source| SinkError::Open {
            path: path.clone(),
            source,
        })?;
        let existing = file
            .metadata()
            .map_err(|source| SinkError::Open {
                path: path.clone(),
                source,
            })?
            .len();

        tracing::debug!(path = %path.display(), existing, "opened output file");

        Ok(Self {
            destination: Destination::File {
                file: Some(file),
                rotation: Rotation::new(path, config.max_backlog),
            },
            bytes_written: existing,
            threshold: config.threshold_bytes(),
            rotations: 0,
        })
    }

    /// Write one formatted line
    pub fn write_formatted(&mut self, line: &str) -> Result<usize, SinkError> {
        self.write(line.as_bytes())
    }

    /// Write a binary record verbatim
    pub fn write_raw(&mut self, record: &[u8]) -> Result<usize, SinkError> {
        self.write(record)
    }

    /// Bytes written to the live destination since it was opened or last rotated
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Completed rotations so far
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    pub fn is_file(&self) -> bool {
        matches!(self.destination, Destination::File { .. })
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.destination {
            Destination::File { rotation, .. } => Some(rotation.base()),
            Destination::Stream(_) => None,
        }
    }

    pub fn flush(&mut self) -> Result<(), SinkError> {
        match &mut self.destination {
            Destination::Stream(writer) => writer.flush().map_err(SinkError::from_write),
            Destination::File { file: Some(file), .. } => {
                file.flush().map_err(SinkError::from_write)
            }
            Destination::File { file: None, .. } => Ok(()),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, SinkError> {
        let writer: &mut dyn Write = match &mut self.destination {
            Destination::Stream(writer) => writer.as_mut(),
            Destination::File { file: Some(file), .. } => file,
            Destination::File { file: None, .. } => {
                return Err(SinkError::Write(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "output file is closed",
                )));
            }
        };
        writer.write_all(bytes).map_err(SinkError::from_write)?;
        self.bytes_written += bytes.len() as u64;

        if self.threshold.is_some_and(|limit| self.bytes_written >= limit) {
            self.rotate()?;
        }

        Ok(bytes.len())
    }

    /// Close the live file, shift the backlog and reopen a fresh live file.
    /// A no-op for stream destinations.
    pub fn rotate(&mut self) -> Result<(), SinkError> {
        let Destination::File { file, rotation } = &mut self.destination else {
            return Ok(());
        };

        drop(file.take());
        rotation.shift_backlog();

        let reopened = open_append(rotation.base()).map_err(|source| SinkError::Reopen {
            path: rotation.base().to_path_buf(),
            source,
        })?;
        *file = Some(reopened);

        self.bytes_written = 0;
        self.rotations += 1;
        tracing::debug!(rotations = self.rotations, "rotated output file");
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.append(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}
