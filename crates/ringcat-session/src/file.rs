//! File-backed log store
//!
//! A log store file is a plain concatenation of binary records, the same
//! stream `-B` writes. Reading it in blocking mode follows the file as it
//! grows, like `tail -f`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;

use ringcat_types::{LogId, LogRecord, RecordError, RecordHeader};

use crate::admin::AdminFrame;
use crate::session::{
    LogSession, QueryKind, ReadMode, ReadOutcome, SessionError, SessionOptions, Tail,
};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

enum Frame {
    Complete(LogRecord),
    /// Clean end of data on a record boundary
    End,
    /// End of data part way through a record
    Partial { have: usize, need: usize },
}

/// A session over a log store file
pub struct FileSession {
    path: PathBuf,
    reader: BufReader<File>,
    options: SessionOptions,
    /// Matching records still to skip before delivery starts
    skip: usize,
    poll_interval: Duration,
}

impl FileSession {
    pub fn open(path: impl Into<PathBuf>, options: SessionOptions) -> Result<Self, SessionError> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| SessionError::Open {
            path: path.clone(),
            source,
        })?;

        let mut session = Self {
            path,
            reader: BufReader::new(file),
            options,
            skip: 0,
            poll_interval: DEFAULT_POLL_INTERVAL,
        };

        if let Tail::Lines(n) = session.options.tail {
            let mut available: usize = 0;
            for_each_record(&session.path, |record| {
                if session.wants(record) {
                    available += 1;
                }
            })?;
            session.skip = available.saturating_sub(n);
        }

        tracing::debug!(
            path = %session.path.display(),
            sources = ?session.options.sources,
            skip = session.skip,
            "opened log store"
        );
        Ok(session)
    }

    /// How long a blocking read sleeps before looking for new data
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn wants(&self, record: &LogRecord) -> bool {
        let requested = self
            .options
            .sources
            .iter()
            .any(|id| id.as_raw() == record.source());
        let recent = match self.options.tail {
            Tail::Since(since) => record.header().timestamp() >= since,
            _ => true,
        };
        requested && recent
    }

    fn read_frame(&mut self) -> Result<Frame, SessionError> {
        read_frame(&mut self.reader)
    }

    /// Count entries and bytes per requested buffer
    fn usage(&self) -> Result<Vec<(LogId, u64, u64)>, SessionError> {
        let mut usage: Vec<(LogId, u64, u64)> =
            self.options.sources.iter().map(|id| (*id, 0, 0)).collect();
        for_each_record(&self.path, |record| {
            if let Some(slot) = usage.iter_mut().find(|(id, _, _)| id.as_raw() == record.source()) {
                slot.1 += 1;
                slot.2 += record.len() as u64;
            }
        })?;
        Ok(usage)
    }
}

impl LogSession for FileSession {
    fn read_next(&mut self) -> Result<ReadOutcome, SessionError> {
        loop {
            let start = self.reader.stream_position()?;

            match self.read_frame()? {
                Frame::Complete(record) => {
                    if !self.wants(&record) {
                        continue;
                    }
                    if self.skip > 0 {
                        self.skip -= 1;
                        continue;
                    }
                    return Ok(ReadOutcome::Record(record));
                }
                Frame::End => {
                    if self.options.mode == ReadMode::NonBlocking {
                        return Ok(ReadOutcome::NoData);
                    }
                    std::thread::sleep(self.poll_interval);
                }
                Frame::Partial { have, need } => {
                    if self.options.mode == ReadMode::NonBlocking {
                        return Err(RecordError::Truncated { have, need }.into());
                    }
                    // The writer is mid-record; try again from its start
                    self.reader.seek(SeekFrom::Start(start))?;
                    std::thread::sleep(self.poll_interval);
                }
            }
        }
    }

    fn clear(&mut self, id: LogId) -> Result<(), SessionError> {
        // Staged beside the store, removed on drop unless persisted
        let parent = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let staged = NamedTempFile::new_in(parent)?;

        let mut kept = 0u64;
        let mut dropped = 0u64;
        {
            let mut out = BufWriter::new(staged.as_file());
            let mut write_result = Ok(());
            for_each_record(&self.path, |record| {
                if record.source() == id.as_raw() {
                    dropped += 1;
                } else if write_result.is_ok() {
                    kept += 1;
                    write_result = out.write_all(record.as_bytes());
                }
            })?;
            write_result?;
            out.flush()?;
        }
        staged.persist(&self.path).map_err(|err| err.error)?;

        // The old handle still points at the replaced file
        self.reader = BufReader::new(File::open(&self.path)?);
        tracing::debug!(buffer = %id, kept, dropped, "cleared buffer");
        Ok(())
    }

    fn ring_size(&mut self, _id: LogId) -> Result<u64, SessionError> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn readable_size(&mut self, id: LogId) -> Result<u64, SessionError> {
        let mut bytes = 0;
        for_each_record(&self.path, |record| {
            if record.source() == id.as_raw() {
                bytes += record.len() as u64;
            }
        })?;
        Ok(bytes)
    }

    fn query(&mut self, kind: QueryKind, buf: &mut [u8]) -> Result<usize, SessionError> {
        if kind == QueryKind::PruneList {
            return Err(SessionError::Unsupported("reading the prune list"));
        }

        let usage = self.usage()?;
        let mut table = format!("{:<10}{:>10}{:>12}\n", "buffer", "entries", "bytes");
        let (mut entries, mut bytes) = (0, 0);
        for (id, count, size) in &usage {
            table.push_str(&format!("{:<10}{:>10}{:>12}\n", id.name(), count, size));
            entries += count;
            bytes += size;
        }
        table.push_str(&format!("{:<10}{:>10}{:>12}\n", "total", entries, bytes));

        Ok(AdminFrame::write_into(table.as_bytes(), buf))
    }
}

/// Visit every complete record in a store file. A partial trailing record
/// is ignored; a malformed header is an error.
fn for_each_record(path: &Path, mut visit: impl FnMut(&LogRecord)) -> Result<(), SessionError> {
    let file = File::open(path).map_err(|source| SessionError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    loop {
        match read_frame(&mut reader)? {
            Frame::Complete(record) => visit(&record),
            Frame::End | Frame::Partial { .. } => return Ok(()),
        }
    }
}

fn read_frame(reader: &mut impl Read) -> Result<Frame, SessionError> {
    let mut prefix = [0u8; 4];
    let got = read_full(reader, &mut prefix)?;
    if got == 0 {
        return Ok(Frame::End);
    }
    if got < prefix.len() {
        return Ok(Frame::Partial {
            have: got,
            need: prefix.len(),
        });
    }

    let need = RecordHeader::frame_len(prefix)?;
    let mut bytes = vec![0u8; need];
    bytes[..4].copy_from_slice(&prefix);
    let got = 4 + read_full(reader, &mut bytes[4..])?;
    if got < need {
        return Ok(Frame::Partial { have: got, need });
    }

    Ok(Frame::Complete(LogRecord::from_bytes(bytes)?))
}

/// Read until `buf` is full or the reader is exhausted
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::AdminQuery;
    use chrono::{TimeZone, Utc};
    use ringcat_types::LogPriority;

    fn record(id: LogId, sec: u32, message: &str) -> LogRecord {
        LogRecord::builder(id)
            .time(sec, 0)
            .text(LogPriority::Info, "test", message)
            .unwrap()
    }

    fn write_store(path: &Path, records: &[LogRecord]) {
        let mut bytes = Vec::new();
        for r in records {
            bytes.extend_from_slice(r.as_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn options(sources: &[LogId], tail: Tail) -> SessionOptions {
        SessionOptions {
            mode: ReadMode::NonBlocking,
            tail,
            sources: sources.to_vec(),
        }
    }

    fn drain(session: &mut FileSession) -> Vec<LogRecord> {
        let mut out = Vec::new();
        loop {
            match session.read_next().unwrap() {
                ReadOutcome::Record(r) => out.push(r),
                ReadOutcome::NoData => return out,
                ReadOutcome::Eof => panic!("file sessions never report Eof"),
            }
        }
    }

    #[test]
    fn test_delivers_requested_sources_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let records = vec![
            record(LogId::Main, 1, "a"),
            record(LogId::Radio, 2, "b"),
            record(LogId::System, 3, "c"),
            record(LogId::Main, 4, "d"),
        ];
        write_store(&path, &records);

        let mut session =
            FileSession::open(&path, options(&[LogId::Main, LogId::System], Tail::All)).unwrap();
        let got = drain(&mut session);
        assert_eq!(got, vec![records[0].clone(), records[2].clone(), records[3].clone()]);
    }

    #[test]
    fn test_tail_lines_keeps_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let records: Vec<_> = (0..6).map(|i| record(LogId::Main, i, "x")).collect();
        write_store(&path, &records);

        let mut session = FileSession::open(&path, options(&[LogId::Main], Tail::Lines(2))).unwrap();
        let got = drain(&mut session);
        assert_eq!(got, records[4..].to_vec());
    }

    #[test]
    fn test_tail_since_skips_older_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let records: Vec<_> = (0..5).map(|i| record(LogId::Main, i * 10, "x")).collect();
        write_store(&path, &records);

        let since = Utc.timestamp_opt(25, 0).single().unwrap();
        let mut session =
            FileSession::open(&path, options(&[LogId::Main], Tail::Since(since))).unwrap();
        let got = drain(&mut session);
        assert_eq!(got, records[3..].to_vec());
    }

    #[test]
    fn test_truncated_tail_is_malformed_when_not_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let whole = record(LogId::Main, 1, "complete");
        let mut bytes = whole.as_bytes().to_vec();
        bytes.extend_from_slice(&record(LogId::Main, 2, "cut").as_bytes()[..10]);
        std::fs::write(&path, bytes).unwrap();

        let mut session = FileSession::open(&path, options(&[LogId::Main], Tail::All)).unwrap();
        assert!(matches!(session.read_next().unwrap(), ReadOutcome::Record(_)));
        assert!(matches!(
            session.read_next(),
            Err(SessionError::Malformed(RecordError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_blocking_read_waits_for_appended_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        std::fs::write(&path, b"").unwrap();

        let late = record(LogId::Main, 9, "late");
        let writer_path = path.clone();
        let writer_bytes = late.as_bytes().to_vec();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            std::fs::write(writer_path, writer_bytes).unwrap();
        });

        let mut session = FileSession::open(
            &path,
            SessionOptions {
                mode: ReadMode::Blocking,
                tail: Tail::All,
                sources: vec![LogId::Main],
            },
        )
        .unwrap()
        .with_poll_interval(Duration::from_millis(5));

        match session.read_next().unwrap() {
            ReadOutcome::Record(r) => assert_eq!(r, late),
            other => panic!("expected a record, got {other:?}"),
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_clear_drops_only_that_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let records = vec![
            record(LogId::Main, 1, "a"),
            record(LogId::System, 2, "b"),
            record(LogId::Main, 3, "c"),
        ];
        write_store(&path, &records);

        let sources = [LogId::Main, LogId::System];
        let mut session = FileSession::open(&path, options(&sources, Tail::All)).unwrap();
        session.clear(LogId::Main).unwrap();
        assert_eq!(session.readable_size(LogId::Main).unwrap(), 0);

        let got = drain(&mut session);
        assert_eq!(got, vec![records[1].clone()]);
        assert_eq!(dir_entries(dir.path()), vec!["store.bin"]);
    }

    #[test]
    fn test_failed_clear_leaves_store_and_dir_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        write_store(&path, &[record(LogId::Main, 1, "a")]);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&[10, 0, 8, 0]);
        bytes.extend_from_slice(&[0; 30]);
        std::fs::write(&path, &bytes).unwrap();

        let mut session = FileSession::open(&path, options(&[LogId::Main], Tail::All)).unwrap();
        let err = session.clear(LogId::Main).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Malformed(RecordError::BadHeaderSize(8))
        ));

        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        assert_eq!(dir_entries(dir.path()), vec!["store.bin"]);
    }

    #[test]
    fn test_sizes_and_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let records = vec![
            record(LogId::Main, 1, "a"),
            record(LogId::System, 2, "bb"),
            record(LogId::Main, 3, "c"),
        ];
        write_store(&path, &records);
        let total: u64 = records.iter().map(|r| r.len() as u64).sum();

        let sources = [LogId::Main, LogId::System];
        let mut session = FileSession::open(&path, options(&sources, Tail::All)).unwrap();
        assert_eq!(session.ring_size(LogId::Main).unwrap(), total);
        assert_eq!(
            session.readable_size(LogId::Main).unwrap(),
            (records[0].len() + records[2].len()) as u64
        );

        let frame = AdminQuery {
            initial_capacity: 16,
            ..AdminQuery::default()
        }
        .run(&mut session, QueryKind::Statistics)
        .unwrap();
        let text = frame.text();
        let main_bytes = (records[0].len() + records[2].len()).to_string();
        let main_line = text.lines().find(|l| l.starts_with("main")).unwrap();
        let fields: Vec<&str> = main_line.split_whitespace().collect();
        assert_eq!(fields, vec!["main", "2", main_bytes.as_str()]);
        assert!(text.lines().any(|l| l.starts_with("total")));
    }

    #[test]
    fn test_prune_list_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        write_store(&path, &[]);

        let mut session = FileSession::open(&path, options(&[LogId::Main], Tail::All)).unwrap();
        assert!(matches!(
            session.set_prune_list("~1000"),
            Err(SessionError::Unsupported(_))
        ));
        let mut buf = [0u8; 64];
        assert!(matches!(
            session.query(QueryKind::PruneList, &mut buf),
            Err(SessionError::Unsupported(_))
        ));
    }

    #[test]
    fn test_missing_store_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.bin");
        let err = FileSession::open(&path, options(&[LogId::Main], Tail::All)).err().unwrap();
        assert!(matches!(err, SessionError::Open { .. }));
        assert!(err.to_string().contains("absent.bin"));
    }
}
