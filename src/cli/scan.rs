//! The `scan` command: offline repository scanning, no database required.

use super::{CliContext, ScanArgs};
use crate::scanner::{self, ScanResult};
use anyhow::{bail, Context as _, Result};
use std::io::Write;
use tracing::{debug, info};

pub(super) fn run(args: &ScanArgs, ctx: &CliContext) -> Result<i32> {
    debug!(path = %args.repo.display(), "scanning repo");
    let result = scanner::scan_parallel(&args.repo, args.parallel).context("scan")?;
    info!(
        files = result.files_scanned,
        skipped = result.files_skipped,
        tables = result.refs.len(),
        columns = result.column_refs.len(),
        "scan complete"
    );

    let format = match args.format.as_deref() {
        Some(f) => f.to_string(),
        None if !ctx.config.defaults.format.is_empty() => ctx.config.defaults.format.clone(),
        None => "text".to_string(),
    };

    let mut stdout = std::io::stdout().lock();
    match format.as_str() {
        "json" => {
            serde_json::to_writer_pretty(&mut stdout, &result)?;
            writeln!(stdout)?;
        }
        "text" => write_scan_text(&mut stdout, &result)?,
        other => bail!("unknown format {other:?} (expected text or json)"),
    }
    Ok(0)
}

fn write_scan_text(w: &mut dyn Write, result: &ScanResult) -> Result<()> {
    if result.tables.is_empty() {
        writeln!(w, "No table references found.")?;
        return Ok(());
    }

    writeln!(w, "Tables ({}):", result.tables.len())?;
    for t in &result.tables {
        writeln!(w, "  {t}")?;
    }

    if !result.columns.is_empty() {
        writeln!(w, "\nColumns ({}):", result.columns.len())?;
        for c in &result.columns {
            writeln!(w, "  {c}")?;
        }
    }

    writeln!(w, "\nReferences ({}):", result.refs.len())?;
    for r in &result.refs {
        let loc = format!("{}:{}", r.file, r.line);
        writeln!(
            w,
            "  {:<30} {:<20} [{}] {}",
            loc,
            r.table,
            serde_plain(&r.context),
            serde_plain(&r.pattern)
        )?;
    }

    writeln!(
        w,
        "\nSummary: {} tables, {} columns, {} references in {} files",
        result.tables.len(),
        result.columns.len(),
        result.refs.len(),
        result.files_scanned
    )?;
    Ok(())
}

/// Render a serde enum as its wire name without quotes.
fn serde_plain<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_default()
        .trim_matches('"')
        .to_string()
}
