//! Terminal reporter.
//!
//! Findings are grouped by `schema.table` in encounter order, with a table of
//! contents once a report exceeds 20 findings, a severity summary line, and
//! the top three finding types.

use super::Report;
use crate::models::{Finding, FindingType, Severity};
use anyhow::Result;
use console::style;
use std::collections::HashMap;
use std::io::{IsTerminal, Write};

fn severity_label(severity: Severity, color: bool) -> String {
    let label = match severity {
        Severity::High => "HIGH",
        Severity::Medium => "MEDIUM",
        Severity::Low => "LOW",
        Severity::Info => "INFO",
    };
    if !color {
        return label.to_string();
    }
    match severity {
        Severity::High => style(label).red().to_string(),
        Severity::Medium => style(label).yellow().to_string(),
        Severity::Low => style(label).cyan().to_string(),
        Severity::Info => style(label).dim().to_string(),
    }
}

pub(super) fn write_text(w: &mut dyn Write, report: &Report, want_color: bool) -> Result<()> {
    let color = want_color && std::io::stdout().is_terminal();

    if report.summary.total == 0 {
        if report.scanned.tables > 0 {
            writeln!(
                w,
                "No issues detected. {} tables, {} indexes scanned.",
                report.scanned.tables, report.scanned.indexes
            )?;
        } else {
            writeln!(w, "No findings.")?;
        }
        return Ok(());
    }

    let groups = group_by_table(&report.findings);

    // Table of contents for large reports
    if report.summary.total > 20 {
        writeln!(w, "Tables with findings:")?;
        for (key, findings) in &groups {
            writeln!(w, "  {} ({})", key, findings.len())?;
        }
        writeln!(w)?;
    }

    for (i, (key, findings)) in groups.iter().enumerate() {
        if i > 0 {
            writeln!(w)?;
        }
        let header = if color {
            style(key.as_str()).bold().to_string()
        } else {
            key.clone()
        };
        writeln!(w, "{header}")?;

        for f in findings {
            let label = severity_label(f.severity, color);
            let mut target = f.kind.to_string();
            if !f.index.is_empty() {
                target.push_str(&format!(" ({})", f.index));
            }
            writeln!(w, "  [{label}] {target}: {}", f.message)?;

            for (k, v) in &f.detail {
                writeln!(w, "    {k}: {v}")?;
            }
        }
    }

    writeln!(
        w,
        "\nSummary: {} findings (high={} medium={} low={} info={})",
        report.summary.total,
        report.summary.high,
        report.summary.medium,
        report.summary.low,
        report.summary.info
    )?;

    // Top finding types
    let mut type_counts: HashMap<FindingType, usize> = HashMap::new();
    for f in &report.findings {
        *type_counts.entry(f.kind).or_insert(0) += 1;
    }
    let mut sorted: Vec<(FindingType, usize)> = type_counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));

    write!(w, "Top types: ")?;
    let limit = sorted.len().min(3);
    for (i, (kind, count)) in sorted.iter().take(limit).enumerate() {
        let sep = if i == limit - 1 { "" } else { ", " };
        write!(w, "{kind} ({count}){sep}")?;
    }
    writeln!(w)?;
    Ok(())
}

/// Group findings by `schema.table`, preserving encounter order.
fn group_by_table(findings: &[Finding]) -> Vec<(String, Vec<&Finding>)> {
    let mut order: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<&Finding>)> = Vec::new();

    for f in findings {
        let key = format!("{}.{}", f.schema, f.table);
        match order.get(&key) {
            Some(&idx) => groups[idx].1.push(f),
            None => {
                order.insert(key.clone(), groups.len());
                groups.push((key, vec![f]));
            }
        }
    }
    groups
}
