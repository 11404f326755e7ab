use thiserror::Error;

use ringcat_output::{OutputSink, SinkError};
use ringcat_session::{LogSession, ReadOutcome, SessionError};
use ringcat_types::{LogRecord, RecordError};

use crate::format::LinePrinter;
use crate::sources::{SourceRef, SourceSet};

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("read: unexpected EOF!")]
    UnexpectedEof,

    #[error("read: unexpected length")]
    Malformed(#[source] RecordError),

    #[error("read failure")]
    Session(#[source] SessionError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl From<SessionError> for ReadError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Malformed(inner) => Self::Malformed(inner),
            other => Self::Session(other),
        }
    }
}

impl ReadError {
    /// The reader on the other end of the output went away
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Self::Sink(SinkError::BrokenPipe))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReadOptions {
    /// Banner on every source switch, not just the first record of each source
    pub print_dividers: bool,

    /// Forward records verbatim instead of formatting them
    pub binary_output: bool,
}

/// Counters for a finished read loop
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub records: u64,
    pub printed: u64,
    pub filtered: u64,
    pub undecodable: u64,
    pub dividers: u64,
    /// Bytes written over the whole run, across every rotated file
    pub bytes_written: u64,
    pub rotations: u64,
}

/// Drives a session to completion, writing what it reads to one sink.
///
/// Records arrive interleaved from every registered source. Whenever the
/// source changes a divider banner may be written first, so readers of
/// multi-source output can tell the runs apart.
pub struct ReadLoop {
    sources: SourceSet,
    printer: LinePrinter,
    sink: OutputSink,
    options: ReadOptions,
    active: Option<SourceRef>,
    summary: ReadSummary,
}

impl ReadLoop {
    pub fn new(
        sources: SourceSet,
        printer: LinePrinter,
        sink: OutputSink,
        options: ReadOptions,
    ) -> Self {
        Self {
            sources,
            printer,
            sink,
            options,
            active: None,
            summary: ReadSummary::default(),
        }
    }

    /// Read until the session runs dry (non-blocking) or fails.
    ///
    /// A blocking session only returns through an error.
    pub fn run<S>(mut self, session: &mut S) -> Result<ReadSummary, ReadError>
    where
        S: LogSession + ?Sized,
    {
        loop {
            match session.read_next()? {
                ReadOutcome::Record(record) => self.handle(&record)?,
                ReadOutcome::NoData => break,
                ReadOutcome::Eof => return Err(ReadError::UnexpectedEof),
            }
        }

        self.sink.flush()?;
        self.summary.rotations = self.sink.rotations();
        tracing::debug!(summary = ?self.summary, "read loop finished");
        Ok(self.summary)
    }

    fn handle(&mut self, record: &LogRecord) -> Result<(), ReadError> {
        self.summary.records += 1;

        let source = self.sources.resolve(record.source());
        if self.active != Some(source) {
            self.maybe_print_start(source)?;
            self.active = Some(source);
        }

        if self.options.binary_output {
            self.summary.bytes_written += self.sink.write_raw(record.as_bytes())? as u64;
            self.summary.printed += 1;
            return Ok(());
        }

        let binary = self.sources.get(source).is_binary();
        match self.printer.render(record, binary) {
            Ok(Some(line)) => {
                self.summary.bytes_written += self.sink.write_formatted(&line)? as u64;
                self.summary.printed += 1;
            }
            Ok(None) => self.summary.filtered += 1,
            Err(err) => {
                tracing::debug!(lid = record.source(), error = %err, "skipping undecodable record");
                self.summary.undecodable += 1;
            }
        }
        Ok(())
    }

    fn maybe_print_start(&mut self, source: SourceRef) -> Result<(), ReadError> {
        let print_dividers = self.options.print_dividers;
        let multiple = self.sources.is_multiple();
        let binary_output = self.options.binary_output;

        let dev = self.sources.get_mut(source);
        if dev.printed() && !print_dividers {
            return Ok(());
        }

        if multiple && !binary_output {
            let banner = format!(
                "--------- {} {}\n",
                if dev.printed() { "switch to" } else { "beginning of" },
                dev.name()
            );
            dev.mark_printed();
            self.summary.bytes_written += self.sink.write_formatted(&banner)? as u64;
            self.summary.dividers += 1;
        } else {
            dev.mark_printed();
        }
        Ok(())
    }
}
