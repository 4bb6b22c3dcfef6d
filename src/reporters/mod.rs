//! Report model and output writers.

mod sarif;
mod spectrehub;
mod text;

pub use spectrehub::hash_uri;

use crate::models::{max_severity, Finding, Severity};
use anyhow::{bail, Result};
use chrono::Utc;
use serde::Serialize;
use std::io::Write;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
    Sarif,
    SpectreHub,
}

impl Format {
    pub fn parse(s: &str) -> Option<Format> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Some(Format::Text),
            "json" => Some(Format::Json),
            "sarif" => Some(Format::Sarif),
            "spectrehub" => Some(Format::SpectreHub),
            _ => None,
        }
    }
}

/// Report context.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Metadata {
    pub tool: String,
    pub version: String,
    pub command: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uri_hash: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub database: String,
}

/// Finding counts by severity.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Summary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl Summary {
    pub fn from_findings(findings: &[Finding]) -> Summary {
        let mut summary = Summary::default();
        for f in findings {
            summary.total += 1;
            match f.severity {
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info => summary.info += 1,
            }
        }
        summary
    }
}

/// What was scanned, for context when a report comes back clean.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScanContext {
    pub tables: usize,
    pub indexes: usize,
    pub schemas: usize,
}

/// The top-level audit/check output.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: Metadata,
    pub findings: Vec<Finding>,
    #[serde(rename = "maxSeverity")]
    pub max_severity: Severity,
    pub summary: Summary,
    pub scanned: ScanContext,
}

impl Report {
    pub fn new(command: &str, findings: Vec<Finding>, version: &str) -> Report {
        let summary = Summary::from_findings(&findings);
        let max = max_severity(&findings);
        Report {
            metadata: Metadata {
                tool: "pgspectre".to_string(),
                version: version.to_string(),
                command: command.to_string(),
                timestamp: Utc::now().to_rfc3339(),
                uri_hash: String::new(),
                database: String::new(),
            },
            findings,
            max_severity: max,
            summary,
            scanned: ScanContext::default(),
        }
    }
}

/// Controls text output behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub no_color: bool,
}

/// Write the report in the given format.
pub fn write(w: &mut dyn Write, report: &Report, format: Format, opts: WriteOptions) -> Result<()> {
    match format {
        Format::Json => write_json(w, report),
        Format::Sarif => sarif::write_sarif(w, report),
        Format::SpectreHub => spectrehub::write_spectrehub(w, report),
        Format::Text => text::write_text(w, report, !opts.no_color),
    }
}

fn write_json(w: &mut dyn Write, report: &Report) -> Result<()> {
    serde_json::to_writer_pretty(&mut *w, report)?;
    writeln!(w)?;
    Ok(())
}

/// Resolve a format name, from the flag if set, else config, else text.
pub fn resolve_format(flag: Option<&str>, config_default: &str) -> Result<Format> {
    let name = match flag {
        Some(name) => name,
        None if !config_default.is_empty() => config_default,
        None => "text",
    };
    match Format::parse(name) {
        Some(format) => Ok(format),
        None => bail!("unknown format {name:?} (expected text, json, sarif, or spectrehub)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FindingType;

    fn finding(kind: FindingType, severity: Severity, table: &str) -> Finding {
        let mut f = Finding::new(kind, severity, "public", table);
        f.message = format!("{kind} on {table}");
        f
    }

    #[test]
    fn summary_counts_by_severity() {
        let findings = vec![
            finding(FindingType::MissingTable, Severity::High, "a"),
            finding(FindingType::MissingColumn, Severity::Medium, "b"),
            finding(FindingType::BloatedIndex, Severity::Low, "c"),
            finding(FindingType::BloatedIndex, Severity::Low, "d"),
            finding(FindingType::CodeMatch, Severity::Info, "e"),
        ];
        let summary = Summary::from_findings(&findings);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.high, 1);
        assert_eq!(summary.medium, 1);
        assert_eq!(summary.low, 2);
        assert_eq!(summary.info, 1);
    }

    #[test]
    fn report_max_severity() {
        let report = Report::new(
            "audit",
            vec![
                finding(FindingType::BloatedIndex, Severity::Low, "a"),
                finding(FindingType::NoPrimaryKey, Severity::Medium, "b"),
            ],
            "0.1.0",
        );
        assert_eq!(report.max_severity, Severity::Medium);
        assert_eq!(report.metadata.tool, "pgspectre");
        assert_eq!(report.metadata.command, "audit");
    }

    #[test]
    fn empty_report_is_info() {
        let report = Report::new("audit", vec![], "0.1.0");
        assert_eq!(report.max_severity, Severity::Info);
        assert_eq!(report.summary.total, 0);
    }

    #[test]
    fn json_output_shape() {
        let mut report = Report::new(
            "check",
            vec![finding(FindingType::MissingTable, Severity::High, "ghost")],
            "0.1.0",
        );
        report.scanned = ScanContext {
            tables: 3,
            indexes: 5,
            schemas: 1,
        };

        let mut out = Vec::new();
        write(&mut out, &report, Format::Json, WriteOptions::default()).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(v["metadata"]["tool"], "pgspectre");
        assert_eq!(v["maxSeverity"], "high");
        assert_eq!(v["summary"]["total"], 1);
        assert_eq!(v["findings"][0]["type"], "MISSING_TABLE");
        assert_eq!(v["scanned"]["tables"], 3);
    }

    #[test]
    fn format_parsing() {
        assert_eq!(Format::parse("text"), Some(Format::Text));
        assert_eq!(Format::parse("JSON"), Some(Format::Json));
        assert_eq!(Format::parse("sarif"), Some(Format::Sarif));
        assert_eq!(Format::parse("spectrehub"), Some(Format::SpectreHub));
        assert_eq!(Format::parse("xml"), None);
    }

    #[test]
    fn resolve_format_precedence() {
        assert_eq!(resolve_format(Some("json"), "text").unwrap(), Format::Json);
        assert_eq!(resolve_format(None, "sarif").unwrap(), Format::Sarif);
        assert_eq!(resolve_format(None, "").unwrap(), Format::Text);
        assert!(resolve_format(Some("bogus"), "").is_err());
    }
}
