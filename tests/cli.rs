use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use ringcat_types::{LogId, LogPriority, LogRecord};

struct Store {
    dir: TempDir,
    path: PathBuf,
    config: PathBuf,
}

impl Store {
    fn new(records: &[LogRecord]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let bytes: Vec<u8> = records.iter().flat_map(|r| r.as_bytes().to_vec()).collect();
        fs::write(&path, bytes).unwrap();

        // Keep any settings file on the test machine out of the way
        let config = dir.path().join("config.toml");
        fs::write(&config, "").unwrap();

        Self { dir, path, config }
    }

    fn dir(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_ringcat"))
            .arg("--config")
            .arg(&self.config)
            .arg("-i")
            .arg(&self.path)
            .args(args)
            .output()
            .unwrap()
    }
}

fn record(id: LogId, sec: u32, message: &str) -> LogRecord {
    LogRecord::builder(id)
        .pid(100)
        .tid(101)
        .time(sec, 0)
        .text(LogPriority::Info, "Test", message)
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn dividers_mark_every_switch() {
    let store = Store::new(&[
        record(LogId::Main, 1, "one"),
        record(LogId::Main, 2, "two"),
        record(LogId::System, 3, "three"),
        record(LogId::Radio, 4, "not requested"),
        record(LogId::Main, 5, "four"),
    ]);

    let output = store.run(&["-d", "-D", "-b", "main", "-b", "system", "-v", "raw"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "--------- beginning of main\n\
         one\n\
         two\n\
         --------- beginning of system\n\
         three\n\
         --------- switch to main\n\
         four\n"
    );
}

#[test]
fn single_buffer_has_no_dividers() {
    let store = Store::new(&[
        record(LogId::Main, 1, "one"),
        record(LogId::System, 2, "skipped"),
        record(LogId::Main, 3, "two"),
    ]);

    let output = store.run(&["-d", "-D", "-b", "main", "-v", "raw"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "one\ntwo\n");
}

#[test]
fn filterspecs_and_tail_count() {
    let mut records: Vec<LogRecord> = (0..5)
        .map(|i| record(LogId::Main, i, &format!("line {i}")))
        .collect();
    records.push(
        LogRecord::builder(LogId::Main)
            .text(LogPriority::Error, "Other", "kept by rule")
            .unwrap(),
    );
    let store = Store::new(&records);

    let output = store.run(&["-t", "3", "-b", "main", "-v", "tag"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "I/Test    : line 3\nI/Test    : line 4\nE/Other   : kept by rule\n"
    );

    let output = store.run(&["-d", "-b", "main", "-v", "brief", "-s", "Other:E"]);
    assert_eq!(stdout(&output), "E/Other   (    0): kept by rule\n");
}

#[test]
fn file_output_rotates_into_bounded_backlog() {
    let message = "x".repeat(200);
    let records: Vec<LogRecord> = (0..40)
        .map(|i| record(LogId::Main, i, &message))
        .collect();
    let store = Store::new(&records);
    let out = store.dir().join("out.log");
    let out_arg = out.to_str().unwrap();

    let output = store.run(&["-d", "-b", "main", "-v", "raw", "-f", out_arg, "-r", "1", "-n", "2"]);
    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty());

    assert!(out.exists());
    assert!(store.dir().join("out.log.1").exists());
    assert!(store.dir().join("out.log.2").exists());
    assert!(!store.dir().join("out.log.3").exists());

    // A rotation happens as soon as a write reaches 1 KiB
    let line_len = message.len() as u64 + 1;
    for name in ["out.log.1", "out.log.2"] {
        let len = fs::metadata(store.dir().join(name)).unwrap().len();
        assert_eq!(len, line_len * 1024u64.div_ceil(line_len));
    }
}

#[test]
fn rotate_without_file_is_a_usage_error() {
    let store = Store::new(&[record(LogId::Main, 1, "one")]);
    let output = store.run(&["-d", "-r", "4"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("-r requires -f"));
}

#[test]
fn binary_output_copies_requested_records() {
    let main = record(LogId::Main, 1, "one");
    let events = record(LogId::Events, 2, "binary buffer");
    let system = record(LogId::System, 3, "three");
    let store = Store::new(&[main.clone(), events, system.clone()]);

    let output = store.run(&["-d", "-D", "-B", "-b", "main", "-b", "system"]);
    assert!(output.status.success());

    let mut expected = main.as_bytes().to_vec();
    expected.extend_from_slice(system.as_bytes());
    assert_eq!(output.stdout, expected);
}

#[test]
fn size_report_and_clear() {
    let main = record(LogId::Main, 1, "one");
    let store = Store::new(&[main.clone(), record(LogId::System, 2, "two")]);

    let output = store.run(&["-g", "-b", "main"]);
    assert!(output.status.success());
    let total = fs::metadata(&store.path).unwrap().len();
    assert_eq!(
        stdout(&output),
        format!(
            "main: ring buffer is {total}b ({}b consumed), max entry is 5120b, max payload is 4068b\n",
            main.len()
        )
    );

    let output = store.run(&["-c", "-b", "system"]);
    assert!(output.status.success());
    assert_eq!(fs::read(&store.path).unwrap(), main.as_bytes());
}

#[test]
fn missing_store_fails() {
    let store = Store::new(&[]);
    let output = Command::new(env!("CARGO_BIN_EXE_ringcat"))
        .arg("--config")
        .arg(&store.config)
        .arg("-d")
        .arg("-i")
        .arg(store.dir().join("absent.bin"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error: couldn't open log store"));
}
