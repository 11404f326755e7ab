use chrono::Local;

use ringcat_types::{LogEntry, LogPriority, LogRecord};

use crate::decode::{DecodeError, RecordDecoder};
use crate::filter::FilterRules;

/// Layout of a printed line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LineFormat {
    Brief,
    Process,
    Tag,
    Thread,
    Raw,
    Time,
    #[default]
    ThreadTime,
    Long,
}

impl LineFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "brief" => Some(Self::Brief),
            "process" => Some(Self::Process),
            "tag" => Some(Self::Tag),
            "thread" => Some(Self::Thread),
            "raw" => Some(Self::Raw),
            "time" => Some(Self::Time),
            "threadtime" => Some(Self::ThreadTime),
            "long" => Some(Self::Long),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Brief => "brief",
            Self::Process => "process",
            Self::Tag => "tag",
            Self::Thread => "thread",
            Self::Raw => "raw",
            Self::Time => "time",
            Self::ThreadTime => "threadtime",
            Self::Long => "long",
        }
    }
}

const RESET: &str = "\x1b[0m";

fn color_for(priority: LogPriority) -> Option<&'static str> {
    match priority {
        LogPriority::Fatal | LogPriority::Error => Some("\x1b[31m"),
        LogPriority::Warn => Some("\x1b[33m"),
        LogPriority::Info => Some("\x1b[32m"),
        LogPriority::Debug => Some("\x1b[34m"),
        _ => None,
    }
}

/// Decodes, filters and formats records into printable text
#[derive(Debug, Default)]
pub struct LinePrinter {
    decoder: RecordDecoder,
    filter: FilterRules,
    format: LineFormat,
    color: bool,
}

impl LinePrinter {
    pub fn new(decoder: RecordDecoder, filter: FilterRules) -> Self {
        Self {
            decoder,
            filter,
            format: LineFormat::default(),
            color: false,
        }
    }

    pub fn with_format(mut self, format: LineFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn format(&self) -> LineFormat {
        self.format
    }

    /// Render a record, or `None` when the filter rejects it
    pub fn render(&self, record: &LogRecord, binary: bool) -> Result<Option<String>, DecodeError> {
        let entry = self.decoder.decode(record, binary)?;
        if !self.filter.matches(&entry) {
            return Ok(None);
        }
        Ok(Some(self.format_entry(&entry)))
    }

    /// Lay out a decoded entry. Every line of a multi-line message gets its
    /// own prefix, except in the long format.
    pub fn format_entry(&self, entry: &LogEntry) -> String {
        let mut out = String::new();
        let color = if self.color {
            color_for(entry.priority)
        } else {
            None
        };

        if self.format == LineFormat::Long {
            if let Some(code) = color {
                out.push_str(code);
            }
            out.push_str(&format!(
                "[ {} {:5}:{:5} {}/{:<8} ]\n{}\n",
                timestamp(entry),
                entry.pid,
                entry.tid,
                entry.priority.as_char(),
                entry.tag,
                entry.message,
            ));
            if color.is_some() {
                out.push_str(RESET);
            }
            out.push('\n');
            return out;
        }

        let (prefix, suffix) = self.affixes(entry);
        let message = entry.message.strip_suffix('\n').unwrap_or(&entry.message);
        for line in message.split('\n') {
            if let Some(code) = color {
                out.push_str(code);
            }
            out.push_str(&prefix);
            out.push_str(line);
            out.push_str(&suffix);
            if color.is_some() {
                out.push_str(RESET);
            }
            out.push('\n');
        }
        out
    }

    fn affixes(&self, entry: &LogEntry) -> (String, String) {
        let p = entry.priority.as_char();
        match self.format {
            LineFormat::Brief => (
                format!("{}/{:<8}({:5}): ", p, entry.tag, entry.pid),
                String::new(),
            ),
            LineFormat::Process => (
                format!("{}({:5}) ", p, entry.pid),
                format!("  ({})", entry.tag),
            ),
            LineFormat::Tag => (format!("{}/{:<8}: ", p, entry.tag), String::new()),
            LineFormat::Thread => (
                format!("{}({:5}:{:5}) ", p, entry.pid, entry.tid),
                String::new(),
            ),
            LineFormat::Raw => (String::new(), String::new()),
            LineFormat::Time => (
                format!("{} {}/{:<8}({:5}): ", timestamp(entry), p, entry.tag, entry.pid),
                String::new(),
            ),
            LineFormat::ThreadTime | LineFormat::Long => (
                format!(
                    "{} {:5} {:5} {} {:<8}: ",
                    timestamp(entry),
                    entry.pid,
                    entry.tid,
                    p,
                    entry.tag
                ),
                String::new(),
            ),
        }
    }
}

fn timestamp(entry: &LogEntry) -> String {
    entry
        .timestamp
        .with_timezone(&Local)
        .format("%m-%d %H:%M:%S%.3f")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ringcat_types::LogId;

    fn entry(message: &str) -> LogEntry {
        let mut entry = LogEntry::bare(LogPriority::Warn, "Net", message);
        entry.pid = 120;
        entry.tid = 121;
        entry
    }

    #[test]
    fn test_format_names() {
        for name in [
            "brief", "process", "tag", "thread", "raw", "time", "threadtime", "long",
        ] {
            assert_eq!(LineFormat::from_name(name).map(|f| f.name()), Some(name));
        }
        assert_eq!(LineFormat::from_name("color"), None);
        assert_eq!(LineFormat::default(), LineFormat::ThreadTime);
    }

    #[test]
    fn test_simple_layouts() {
        let e = entry("link down");
        let printer = |format| LinePrinter::default().with_format(format).format_entry(&e);

        assert_eq!(printer(LineFormat::Brief), "W/Net     (  120): link down\n");
        assert_eq!(printer(LineFormat::Process), "W(  120) link down  (Net)\n");
        assert_eq!(printer(LineFormat::Tag), "W/Net     : link down\n");
        assert_eq!(printer(LineFormat::Thread), "W(  120:  121) link down\n");
        assert_eq!(printer(LineFormat::Raw), "link down\n");
    }

    #[test]
    fn test_timed_layouts_carry_timestamp() {
        let e = entry("up");
        let stamp = timestamp(&e);

        let line = LinePrinter::default().format_entry(&e);
        assert_eq!(line, format!("{stamp}   120   121 W Net     : up\n"));

        let line = LinePrinter::default()
            .with_format(LineFormat::Long)
            .format_entry(&e);
        assert_eq!(line, format!("[ {stamp}   120:  121 W/Net      ]\nup\n\n"));
    }

    #[test]
    fn test_multiline_message_prefixes_each_line() {
        let printed = LinePrinter::default()
            .with_format(LineFormat::Tag)
            .format_entry(&entry("first\nsecond\n"));
        assert_eq!(printed, "W/Net     : first\nW/Net     : second\n");
    }

    #[test]
    fn test_color_wraps_each_line() {
        let printed = LinePrinter::default()
            .with_format(LineFormat::Raw)
            .with_color(true)
            .format_entry(&entry("a\nb"));
        assert_eq!(printed, "\x1b[33ma\x1b[0m\n\x1b[33mb\x1b[0m\n");

        let verbose = LogEntry::bare(LogPriority::Verbose, "t", "quiet");
        let printed = LinePrinter::default()
            .with_format(LineFormat::Raw)
            .with_color(true)
            .format_entry(&verbose);
        assert_eq!(printed, "quiet\n");
    }

    #[test]
    fn test_render_applies_filter() {
        let mut rules = FilterRules::new();
        rules.add_spec("*:E").unwrap();
        let printer =
            LinePrinter::new(RecordDecoder::default(), rules).with_format(LineFormat::Brief);

        let info = LogRecord::builder(LogId::Main)
            .pid(7)
            .text(LogPriority::Info, "App", "hello")
            .unwrap();
        assert_eq!(printer.render(&info, false).unwrap(), None);

        let error = LogRecord::builder(LogId::Main)
            .pid(7)
            .text(LogPriority::Error, "App", "boom")
            .unwrap();
        assert_eq!(
            printer.render(&error, false).unwrap().as_deref(),
            Some("E/App     (    7): boom\n")
        );
    }
}
