mod admin;
mod cli;
mod config;

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{CommandFactory, Parser, error::ErrorKind};

use ringcat_logs::{
    EventTagMap, FilterRules, LinePrinter, ReadError, ReadLoop, ReadOptions, RecordDecoder,
    SourceSet,
};
use ringcat_output::{OutputSink, RotationConfig, parse_size};
use ringcat_session::{FileSession, ReadMode, SessionOptions, Tail};

use crate::admin::AdminRequest;
use crate::cli::Args;
use crate::config::Settings;

fn main() -> ExitCode {
    let args = Args::parse();

    // Diagnostics go to stderr, stdout carries the log
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_broken_pipe(&e) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// The reader of our output went away, which just means stop
fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ReadError>()
            .is_some_and(ReadError::is_broken_pipe)
            || cause
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::BrokenPipe)
    })
}

/// Report a bad combination of arguments with usage and exit
fn usage_error(kind: ErrorKind, message: impl std::fmt::Display) -> ! {
    Args::command().error(kind, message).exit()
}

fn run(args: Args) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;

    if args.rotate_kbytes.is_some() && args.file.is_none() {
        usage_error(ErrorKind::MissingRequiredArgument, "-r requires -f as well");
    }

    let sources = select_sources(&args, &settings);

    let input = match args.input.clone().or_else(|| settings.input.clone()) {
        Some(input) => input,
        None => usage_error(
            ErrorKind::MissingRequiredArgument,
            "no log store given, use -i or set `input` in the settings file",
        ),
    };

    let (mode, tail) = read_position(&args);
    let mut session = FileSession::open(
        &input,
        SessionOptions {
            mode,
            tail,
            sources: sources.ids(),
        },
    )
    .with_context(|| format!("couldn't open log store {}", input.display()))?;

    let request = admin_request(&args);
    if admin::run(&mut session, &sources, &request, &mut std::io::stdout().lock())? {
        return Ok(());
    }

    let printer = build_printer(&args, &settings)?;
    let sink = match &args.file {
        Some(path) => {
            let rotation = RotationConfig {
                threshold_kb: args.rotate_kbytes.or(settings.rotate_kbytes).unwrap_or(0),
                max_backlog: args
                    .rotate_count
                    .or(settings.max_rotated)
                    .unwrap_or(RotationConfig::DEFAULT_MAX_BACKLOG),
            };
            OutputSink::file(path, rotation)?
        }
        None => OutputSink::stdout(),
    };

    let options = ReadOptions {
        print_dividers: args.dividers,
        binary_output: args.binary,
    };
    let summary = ReadLoop::new(sources, printer, sink, options).run(&mut session)?;
    tracing::debug!(?summary, "done");
    Ok(())
}

fn select_sources(args: &Args, settings: &Settings) -> SourceSet {
    let names: &[String] = if !args.buffers.is_empty() {
        args.buffers.as_slice()
    } else {
        match &settings.buffers {
            Some(names) if !names.is_empty() => names.as_slice(),
            _ => return SourceSet::with_defaults(),
        }
    };

    if names.iter().any(|name| name == "all") {
        return SourceSet::all();
    }

    let mut sources = SourceSet::new();
    for name in names {
        if let Err(e) = sources.register_name(name) {
            usage_error(ErrorKind::InvalidValue, e);
        }
    }
    sources
}

fn read_position(args: &Args) -> (ReadMode, Tail) {
    let now = Local::now();
    let parse = |value: &str| match cli::parse_tail(value, now) {
        Ok(tail) => tail,
        Err(message) => usage_error(ErrorKind::InvalidValue, message),
    };

    if let Some(value) = &args.tail {
        (ReadMode::NonBlocking, parse(value))
    } else if let Some(value) = &args.tail_follow {
        (ReadMode::Blocking, parse(value))
    } else if args.dump {
        (ReadMode::NonBlocking, Tail::All)
    } else {
        (ReadMode::Blocking, Tail::All)
    }
}

fn admin_request(args: &Args) -> AdminRequest {
    let set_size = args.set_size.as_deref().map(|text| match parse_size(text) {
        Ok(0) => usage_error(ErrorKind::InvalidValue, "-G needs a size greater than zero"),
        Ok(bytes) => bytes,
        Err(e) => usage_error(ErrorKind::InvalidValue, format!("-G {text}: {e}")),
    });

    AdminRequest {
        clear: args.clear,
        get_size: args.get_size,
        set_size,
        set_prune: args.set_prune.clone(),
        statistics: args.statistics,
        prune: args.prune,
    }
}

fn build_printer(args: &Args, settings: &Settings) -> Result<LinePrinter> {
    let tag_map = settings
        .event_tags
        .as_deref()
        .and_then(|path| match EventTagMap::load(path) {
            Ok(map) => Some(map),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "couldn't load event tags");
                None
            }
        });

    let mut filter = FilterRules::new();
    if args.silent {
        filter.silence_all();
    }
    for spec in &args.filterspecs {
        if let Err(e) = filter.add_spec(spec) {
            usage_error(ErrorKind::InvalidValue, e);
        }
    }
    if let Some(pattern) = &args.regex {
        filter = filter
            .with_regex(pattern)
            .with_context(|| format!("invalid -e pattern '{pattern}'"))?;
    }

    let mut formats = settings.format.iter().cloned().collect::<Vec<_>>();
    formats.extend(args.formats.iter().cloned());
    let (format, color) = match cli::parse_formats(&formats) {
        Ok(parsed) => parsed,
        Err(message) => usage_error(ErrorKind::InvalidValue, message),
    };

    Ok(LinePrinter::new(RecordDecoder::new(tag_map), filter)
        .with_format(format.unwrap_or_default())
        .with_color(color))
}
