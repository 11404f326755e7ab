//! One-shot administrative commands run before any streaming

use std::io::Write;

use anyhow::{Context, Result};

use ringcat_logs::SourceSet;
use ringcat_output::decompose;
use ringcat_session::{AdminQuery, LogId, LogSession, QueryKind};
use ringcat_types::{MAX_ENTRY_LEN, MAX_PAYLOAD_LEN};

/// Administrative work requested on the command line
#[derive(Debug, Default)]
pub struct AdminRequest {
    pub clear: bool,
    pub get_size: bool,
    pub set_size: Option<u64>,
    pub set_prune: Option<String>,
    pub statistics: bool,
    pub prune: bool,
}

impl AdminRequest {
    pub fn is_empty(&self) -> bool {
        !self.clear
            && !self.get_size
            && self.set_size.is_none()
            && self.set_prune.is_none()
            && !self.statistics
            && !self.prune
    }
}

/// Run the requested commands, printing results to `out`.
///
/// Returns `true` when the process should exit instead of streaming.
pub fn run<S, W>(
    session: &mut S,
    sources: &SourceSet,
    request: &AdminRequest,
    out: &mut W,
) -> Result<bool>
where
    S: LogSession + ?Sized,
    W: Write,
{
    if request.is_empty() {
        return Ok(false);
    }

    for id in sources.ids() {
        if request.clear {
            session
                .clear(id)
                .with_context(|| format!("failed to clear the '{id}' log"))?;
        }

        if let Some(bytes) = request.set_size {
            session
                .set_ring_size(id, bytes)
                .with_context(|| format!("failed to set the '{id}' log size"))?;
        }

        if request.get_size {
            writeln!(out, "{}", size_report(session, id)?)?;
        }
    }

    if let Some(list) = &request.set_prune {
        session
            .set_prune_list(list)
            .context("failed to set the prune configuration")?;
    }

    let kind = if request.statistics {
        Some(QueryKind::Statistics)
    } else if request.prune {
        Some(QueryKind::PruneList)
    } else {
        None
    };
    if let Some(kind) = kind {
        let frame = AdminQuery::default()
            .run(session, kind)
            .with_context(|| format!("failed to read the {kind}"))?;
        if frame.truncated {
            tracing::warn!(%kind, declared = frame.declared_size, "reply was cut short");
        }
        out.write_all(&frame.payload)?;
    }

    out.flush()?;
    Ok(true)
}

fn size_report<S>(session: &mut S, id: LogId) -> Result<String>
where
    S: LogSession + ?Sized,
{
    let total = session
        .ring_size(id)
        .with_context(|| format!("failed to get the '{id}' log size"))?;
    let consumed = session
        .readable_size(id)
        .with_context(|| format!("failed to get the '{id}' readable size"))?;

    let (total, total_unit) = decompose(total);
    let (consumed, consumed_unit) = decompose(consumed);
    Ok(format!(
        "{id}: ring buffer is {total}{total_unit}b ({consumed}{consumed_unit}b consumed), \
         max entry is {MAX_ENTRY_LEN}b, max payload is {MAX_PAYLOAD_LEN}b"
    ))
}
