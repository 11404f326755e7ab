use std::path::PathBuf;

use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone, Utc};
use clap::Parser;

use ringcat_logs::LineFormat;
use ringcat_session::Tail;

/// ringcat - read, filter and rotate interleaved log ring buffers
#[derive(Parser, Debug)]
#[command(name = "ringcat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Filterspecs of the form <tag>[:priority], e.g. `ActivityManager:I *:S`
    #[arg(value_name = "FILTERSPEC")]
    pub filterspecs: Vec<String>,

    /// Set the default filter to silent (same as `*:S`)
    #[arg(short = 's')]
    pub silent: bool,

    /// Log to this file instead of stdout
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Rotate the output file every <KBYTES> written (16 if no value). Requires -f
    #[arg(
        short = 'r',
        long = "rotate-kbytes",
        value_name = "KBYTES",
        num_args = 0..=1,
        default_missing_value = "16"
    )]
    pub rotate_kbytes: Option<u64>,

    /// Number of rotated files to keep (default 4)
    #[arg(short = 'n', long = "rotate-count", value_name = "COUNT")]
    pub rotate_count: Option<u32>,

    /// Output format: brief process tag thread raw time threadtime long, or `color`
    #[arg(short = 'v', long = "format", value_name = "FORMAT")]
    pub formats: Vec<String>,

    /// Print a divider on every switch between buffers
    #[arg(short = 'D', long = "dividers")]
    pub dividers: bool,

    /// Clear the selected buffers and exit
    #[arg(short = 'c', long = "clear")]
    pub clear: bool,

    /// Dump the log and exit instead of following it
    #[arg(short = 'd')]
    pub dump: bool,

    /// Print only the most recent <COUNT> lines, or lines since 'MM-DD hh:mm:ss.mmm', then exit
    #[arg(short = 't', value_name = "COUNT|TIME", conflicts_with = "tail_follow")]
    pub tail: Option<String>,

    /// Like -t but keep following afterwards
    #[arg(short = 'T', value_name = "COUNT|TIME")]
    pub tail_follow: Option<String>,

    /// Report the size of the selected buffers and exit
    #[arg(short = 'g', long = "buffer-size")]
    pub get_size: bool,

    /// Set the size of the selected buffers, with an optional K, M or G suffix
    #[arg(short = 'G', long = "set-buffer-size", value_name = "SIZE")]
    pub set_size: Option<String>,

    /// Print the prune list
    #[arg(short = 'p', long = "prune")]
    pub prune: bool,

    /// Set the prune list
    #[arg(short = 'P', long = "set-prune", value_name = "LIST")]
    pub set_prune: Option<String>,

    /// Buffer to read (main, radio, events, system, crash or all). May be repeated
    #[arg(short = 'b', long = "buffer", value_name = "BUFFER")]
    pub buffers: Vec<String>,

    /// Write records in binary instead of formatting them
    #[arg(short = 'B', long = "binary")]
    pub binary: bool,

    /// Print statistics and exit
    #[arg(short = 'S', long = "statistics")]
    pub statistics: bool,

    /// Only print messages matching this regex
    #[arg(short = 'e', long = "regex", value_name = "EXPR")]
    pub regex: Option<String>,

    /// Log store to read
    #[arg(short = 'i', long = "input", value_name = "STORE")]
    pub input: Option<PathBuf>,

    /// Settings file to use instead of the default location
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Interpret a `-t`/`-T` argument.
///
/// All digits is a line count, anything else a `MM-DD hh:mm:ss.mmm` time in
/// the current year.
pub fn parse_tail(value: &str, now: DateTime<Local>) -> Result<Tail, String> {
    let value = value.trim();
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        let count: usize = value
            .parse()
            .map_err(|_| format!("tail count '{value}' is too large"))?;
        if count == 0 {
            tracing::warn!("tail count of 0 shows the last line");
            return Ok(Tail::Lines(1));
        }
        return Ok(Tail::Lines(count));
    }

    let stamped = format!("{}-{}", now.year(), value);
    let naive = NaiveDateTime::parse_from_str(&stamped, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|_| format!("'{value}' is neither a line count nor 'MM-DD hh:mm:ss.mmm'"))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("'{value}' does not exist in the local time zone"))?;
    Ok(Tail::Since(local.with_timezone(&Utc)))
}

/// Resolve the `-v` arguments into a format (the last one named wins) and
/// whether color was asked for
pub fn parse_formats(values: &[String]) -> Result<(Option<LineFormat>, bool), String> {
    let mut format = None;
    let mut color = false;
    for value in values {
        if value == "color" {
            color = true;
            continue;
        }
        format = Some(
            LineFormat::from_name(value).ok_or_else(|| format!("unknown output format '{value}'"))?,
        );
    }
    Ok((format, color))
}
