use std::io;
use std::path::{Path, PathBuf};

/// Size-triggered rotation settings, fixed at startup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RotationConfig {
    /// Rotate once this many KiB have been written (0 = never)
    pub threshold_kb: u64,

    /// Number of numbered backlog files kept next to the live file
    pub max_backlog: u32,
}

impl RotationConfig {
    pub const DEFAULT_THRESHOLD_KB: u64 = 16;
    pub const DEFAULT_MAX_BACKLOG: u32 = 4;

    /// Threshold in bytes, `None` when rotation is disabled
    pub fn threshold_bytes(&self) -> Option<u64> {
        (self.threshold_kb > 0).then(|| self.threshold_kb.saturating_mul(1024))
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            threshold_kb: 0,
            max_backlog: Self::DEFAULT_MAX_BACKLOG,
        }
    }
}

/// A rename that failed for a reason other than a missing source file
#[derive(Debug)]
pub struct RenameFailure {
    pub from: PathBuf,
    pub to: PathBuf,
    pub source: io::Error,
}

impl std::fmt::Display for RenameFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "renaming {} to {}: {}",
            self.from.display(),
            self.to.display(),
            self.source
        )
    }
}

/// Shifts the numbered backlog `P.1 .. P.N` behind a live file `P`.
///
/// Index 1 is the newest backlog file and index N the oldest, which the next
/// shift overwrites. Indices are zero-padded to the digit count of N.
#[derive(Clone, Debug)]
pub struct Rotation {
    base: PathBuf,
    max_backlog: u32,
    width: usize,
}

impl Rotation {
    pub fn new(base: impl Into<PathBuf>, max_backlog: u32) -> Self {
        Self {
            base: base.into(),
            max_backlog,
            width: digit_count(max_backlog),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn max_backlog(&self) -> u32 {
        self.max_backlog
    }

    /// Path of backlog file `index`; index 0 is the live file itself
    pub fn backlog_path(&self, index: u32) -> PathBuf {
        if index == 0 {
            return self.base.clone();
        }
        let mut name = self.base.clone().into_os_string();
        name.push(format!(".{index:0width$}", width = self.width));
        PathBuf::from(name)
    }

    /// Rename `P.(i-1)` to `P.i` for i from N down to 1.
    ///
    /// Walking high to low means no rename clobbers a file that a later step
    /// still has to move. Missing sources are skipped silently; any other
    /// failure is logged and returned, and the shift carries on.
    pub fn shift_backlog(&self) -> Vec<RenameFailure> {
        let mut failures = Vec::new();

        for index in (1..=self.max_backlog).rev() {
            let from = self.backlog_path(index - 1);
            let to = self.backlog_path(index);

            match std::fs::rename(&from, &to) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    let failure = RenameFailure { from, to, source };
                    tracing::warn!("while rotating log files: {failure}");
                    failures.push(failure);
                }
            }
        }

        failures
    }
}

/// Decimal digits needed to print `n` (0 for 0)
fn digit_count(mut n: u32) -> usize {
    let mut digits = 0;
    while n > 0 {
        digits += 1;
        n /= 10;
    }
    digits
}
