//! The `check` command: code repo plus cluster drift analysis.

use super::filters::resolve_check_fail_on;
use super::{audit_opts_from_config, fetch_snapshot, finish_report, narrow_snapshot};
use super::{CheckArgs, CliContext};
use crate::detectors;
use crate::scanner;
use anyhow::{Context as _, Result};
use tracing::{debug, info, warn};

pub(super) fn run(args: &CheckArgs, ctx: &CliContext) -> Result<i32> {
    let db_url = ctx.require_db_url()?.to_string();

    // Scan the repo first; it needs no deadline, only the catalog does.
    debug!(path = %args.repo.display(), "scanning repo");
    let scan = scanner::scan_parallel(&args.repo, args.parallel).context("scan repo")?;
    info!(
        refs = scan.refs.len(),
        files = scan.files_scanned,
        "scan complete"
    );

    let snap = fetch_snapshot(&db_url, ctx.config.timeout())?;
    let (snap, schemas) = narrow_snapshot(snap, args.report.schema.as_deref(), &ctx.config);
    info!(
        tables = snap.tables.len(),
        indexes = snap.indexes.len(),
        constraints = snap.constraints.len(),
        schemas = ?schemas,
        "inspected"
    );

    if snap.tables.is_empty() {
        let hint = if schemas.is_empty() {
            "public".to_string()
        } else {
            schemas.join(", ")
        };
        warn!(schemas = %hint, "no tables found");
    }

    let findings = detectors::diff(&scan, &snap, audit_opts_from_config(&ctx.config, &schemas));

    let fail_on = resolve_check_fail_on(
        args.report.fail_on.as_deref(),
        args.fail_on_missing,
        args.fail_on_drift,
    );

    finish_report(
        "check",
        findings,
        &snap,
        &args.report,
        fail_on.as_deref(),
        ctx,
        &db_url,
    )
}
