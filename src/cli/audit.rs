//! The `audit` command: cluster-only analysis.

use super::{audit_opts_from_config, fetch_snapshot, finish_report, narrow_snapshot};
use super::{CliContext, ReportArgs};
use crate::detectors;
use anyhow::Result;
use tracing::{info, warn};

pub(super) fn run(args: &ReportArgs, ctx: &CliContext) -> Result<i32> {
    let db_url = ctx.require_db_url()?.to_string();

    let snap = fetch_snapshot(&db_url, ctx.config.timeout())?;
    let (snap, schemas) = narrow_snapshot(snap, args.schema.as_deref(), &ctx.config);
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

    let findings = detectors::audit(&snap, audit_opts_from_config(&ctx.config, &schemas));

    finish_report(
        "audit",
        findings,
        &snap,
        args,
        args.fail_on.as_deref(),
        ctx,
        &db_url,
    )
}
