//! CLI command definitions and handlers.

mod audit;
mod check;
mod filters;
mod scan;

use crate::baseline::Baseline;
use crate::catalog::{filter_snapshot, resolve_schemas, Inspector, Snapshot};
use crate::config::Config;
use crate::detectors::AuditOptions;
use crate::models::{exit_code, Finding};
use crate::reporters::{self, hash_uri, Report, ScanContext, WriteOptions};
use crate::suppress::Rules;
use anyhow::{bail, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const ENV_DB_URL: &str = "PGSPECTRE_DB_URL";

/// Version and build metadata. Commit and date are stamped by the release
/// build via PGSPECTRE_COMMIT / PGSPECTRE_BUILD_DATE; dev builds carry
/// placeholders.
#[derive(Debug, Clone, Copy, Serialize)]
struct BuildInfo {
    version: &'static str,
    commit: &'static str,
    date: &'static str,
}

impl BuildInfo {
    fn current() -> BuildInfo {
        BuildInfo {
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("PGSPECTRE_COMMIT").unwrap_or("none"),
            date: option_env!("PGSPECTRE_BUILD_DATE").unwrap_or("unknown"),
        }
    }
}

/// pgspectre - PostgreSQL schema and usage auditor
///
/// Scans codebases for table/column references, compares with live Postgres
/// schema and statistics, detects drift.
#[derive(Parser, Debug)]
#[command(name = "pgspectre")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// PostgreSQL connection URL (or set PGSPECTRE_DB_URL)
    #[arg(long, global = true)]
    pub db_url: Option<String>,

    /// Enable debug-level logging
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by the report-producing commands.
#[derive(Args, Debug, Default)]
pub struct ReportArgs {
    /// Output format: text, json, sarif, or spectrehub
    #[arg(long)]
    pub format: Option<String>,

    /// Exit 2 if findings match (comma-separated types or severity: high,medium)
    #[arg(long)]
    pub fail_on: Option<String>,

    /// Show only findings at or above this severity (high, medium, low, info)
    #[arg(long)]
    pub min_severity: Option<String>,

    /// Show only these finding types (comma-separated, e.g. UNUSED_INDEX,BLOATED_INDEX)
    #[arg(long = "type")]
    pub type_filter: Option<String>,

    /// Schemas to analyze (comma-separated, or 'all' for all non-system schemas)
    #[arg(long)]
    pub schema: Option<String>,

    /// Disable ANSI color output
    #[arg(long)]
    pub no_color: bool,

    /// Path to baseline file (suppress known findings)
    #[arg(long)]
    pub baseline: Option<PathBuf>,

    /// Save current findings as new baseline
    #[arg(long)]
    pub update_baseline: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to code repository to scan
    #[arg(long)]
    pub repo: PathBuf,

    /// Exit 2 if any MISSING_TABLE found (deprecated, use --fail-on)
    #[arg(long)]
    pub fail_on_missing: bool,

    /// Exit 2 if any schema drift found (alias for MISSING_COLUMN, deprecated)
    #[arg(long)]
    pub fail_on_drift: bool,

    /// Number of scanner workers (0=CPU count, 1=sequential)
    #[arg(long, default_value_t = 0)]
    pub parallel: usize,

    #[command(flatten)]
    pub report: ReportArgs,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Path to code repository to scan (required)
    #[arg(long)]
    pub repo: PathBuf,

    /// Output format: text or json
    #[arg(long)]
    pub format: Option<String>,

    /// Number of scanner workers (0=CPU count, 1=sequential)
    #[arg(long, default_value_t = 0)]
    pub parallel: usize,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cluster-only analysis: unused tables, indexes, missing stats
    Audit(ReportArgs),

    /// Code repo + cluster: missing tables, schema drift, unindexed queries
    Check(CheckArgs),

    /// Scan code repo for SQL table/column references (no database required)
    Scan(ScanArgs),

    /// Print the version
    Version {
        /// Output version as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Everything a command handler needs beyond its own flags.
pub(crate) struct CliContext {
    pub config: Config,
    pub db_url: String,
    pub version: &'static str,
}

impl CliContext {
    fn require_db_url(&self) -> Result<&str> {
        if self.db_url.is_empty() {
            bail!("--db-url is required (or set {ENV_DB_URL})");
        }
        Ok(&self.db_url)
    }
}

/// Run the CLI with parsed arguments, returning the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    init_logging(cli.verbose);

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = Config::load(&cwd).context("load config")?;
    if Config::exists(&cwd) {
        tracing::debug!(path = %cwd.display(), "config loaded");
    } else {
        tracing::debug!(path = %cwd.display(), "no .pgspectre.yml found, using defaults");
    }

    let db_url = cli
        .db_url
        .filter(|u| !u.is_empty())
        .or_else(|| std::env::var(ENV_DB_URL).ok().filter(|u| !u.is_empty()))
        .unwrap_or_else(|| config.db_url.clone());

    let ctx = CliContext {
        config,
        db_url,
        version: env!("CARGO_PKG_VERSION"),
    };

    match cli.command {
        Commands::Audit(args) => audit::run(&args, &ctx),
        Commands::Check(args) => check::run(&args, &ctx),
        Commands::Scan(args) => scan::run(&args, &ctx),
        Commands::Version { json } => {
            print_version(BuildInfo::current(), json)?;
            Ok(0)
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn print_version(info: BuildInfo, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!(
            "pgspectre {} (commit: {}, built: {})",
            info.version, info.commit, info.date
        );
    }
    Ok(())
}

/// Connect, inspect, and return the catalog snapshot under a deadline.
pub(crate) fn fetch_snapshot(db_url: &str, timeout: Duration) -> Result<Snapshot> {
    let rt = tokio::runtime::Runtime::new().context("start async runtime")?;
    rt.block_on(async {
        let inspect = async {
            let inspector = Inspector::connect(db_url).await?;
            let server_version = inspector.server_version().await?;
            info!(version = %server_version, "connected");
            let snap = inspector.snapshot().await?;
            inspector.close().await;
            Ok::<Snapshot, crate::catalog::CatalogError>(snap)
        };
        match tokio::time::timeout(timeout, inspect).await {
            Ok(result) => result.map_err(anyhow::Error::from),
            Err(_) => bail!("catalog queries exceeded deadline of {timeout:?}"),
        }
    })
}

/// Resolve the --schema flag, falling back to the config's `schemas` list.
pub(crate) fn resolve_schema_flag(flag: Option<&str>, config: &Config) -> Vec<String> {
    match flag {
        Some(flag) if !flag.is_empty() => {
            let parts: Vec<String> = flag.split(',').map(|s| s.to_string()).collect();
            resolve_schemas(&parts)
        }
        _ => resolve_schemas(&config.schemas),
    }
}

/// Build detector options from config. An include list wins over
/// `exclude.schemas`: included schemas are removed from the exclusions.
pub(crate) fn audit_opts_from_config(config: &Config, include_schemas: &[String]) -> AuditOptions {
    let mut exclude_schemas = config.exclude.schemas.clone();
    if !include_schemas.is_empty() {
        exclude_schemas.retain(|s| {
            !include_schemas
                .iter()
                .any(|inc| inc.eq_ignore_ascii_case(s))
        });
    }

    AuditOptions {
        vacuum_days: config.thresholds.vacuum_days,
        unused_index_min_bytes: config.thresholds.unused_index_min_bytes,
        bloat_min_bytes: config.thresholds.bloat_min_bytes,
        exclude_tables: config.exclude.tables.clone(),
        exclude_schemas,
    }
}

/// Narrow a snapshot per the --schema flag / config.
pub(crate) fn narrow_snapshot(
    snap: Snapshot,
    schema_flag: Option<&str>,
    config: &Config,
) -> (Snapshot, Vec<String>) {
    let schemas = resolve_schema_flag(schema_flag, config);
    let snap = filter_snapshot(snap, &schemas);
    (snap, schemas)
}

/// The database name from a PostgreSQL connection URL.
pub(crate) fn extract_database(raw_url: &str) -> String {
    url::Url::parse(raw_url)
        .map(|u| u.path().trim_start_matches('/').to_string())
        .unwrap_or_default()
}

/// Shared tail of the audit and check commands: report filters, baseline
/// update, baseline/suppression filtering, report rendering, exit code.
pub(crate) fn finish_report(
    command: &str,
    findings: Vec<Finding>,
    snap: &Snapshot,
    args: &ReportArgs,
    fail_on: Option<&str>,
    ctx: &CliContext,
    db_url: &str,
) -> Result<i32> {
    let total_before = findings.len();

    let findings = filters::apply_report_filters(
        findings,
        args.min_severity.as_deref(),
        args.type_filter.as_deref(),
    );

    // Save the baseline before baseline/suppression filtering; a run that
    // updates the baseline does not also apply one.
    let mut suppressed = 0;
    let mut findings = findings;
    if let Some(path) = &args.update_baseline {
        Baseline::save(path, &findings).context("save baseline")?;
        info!(path = %path.display(), findings = findings.len(), "baseline saved");
    } else if let Some(path) = &args.baseline {
        let baseline = Baseline::load(path).context("load baseline")?;
        let (remaining, n) = baseline.filter(findings);
        findings = remaining;
        suppressed += n;
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let rules = Rules::load(&cwd)
        .context("load suppress rules")?
        .with_config_findings(&ctx.config.exclude.findings);
    let (findings, n) = rules.filter(findings);
    suppressed += n;

    let mut report = Report::new(command, findings, ctx.version);
    report.metadata.uri_hash = hash_uri(db_url);
    report.metadata.database = extract_database(db_url);
    report.scanned = ScanContext {
        tables: snap.tables.len(),
        indexes: snap.indexes.len(),
        schemas: snap.schema_count(),
    };

    let filtered = total_before - report.findings.len() - suppressed;
    if suppressed > 0 || filtered > 0 {
        info!(
            showing = report.findings.len(),
            total = total_before,
            suppressed,
            filtered,
            "findings filtered"
        );
    }

    let format = reporters::resolve_format(args.format.as_deref(), &ctx.config.defaults.format)?;
    let mut stdout = std::io::stdout().lock();
    reporters::write(
        &mut stdout,
        &report,
        format,
        WriteOptions {
            no_color: args.no_color,
        },
    )
    .context("write report")?;

    if let Some(fail_on) = fail_on {
        if filters::should_fail_on(&report.findings, fail_on) {
            return Ok(2);
        }
    }

    Ok(exit_code(report.max_severity))
}
