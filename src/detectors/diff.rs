//! Code-vs-database drift detectors.

use super::{audit, detect_unindexed_queries, AuditOptions};
use crate::catalog::{Snapshot, TableInfo, TableStats};
use crate::models::{Finding, FindingType, Severity};
use crate::scanner::ScanResult;
use std::collections::{HashMap, HashSet};

/// Compare code repo references against the live database snapshot. The
/// result also includes the audit findings for cluster-only issues.
pub fn diff(scan: &ScanResult, snap: &Snapshot, opts: AuditOptions) -> Vec<Finding> {
    let db_tables: HashMap<String, &TableInfo> = snap
        .tables
        .iter()
        .map(|t| (t.name.to_lowercase(), t))
        .collect();

    let stats_map: HashMap<String, &TableStats> = snap
        .stats
        .iter()
        .map(|s| (s.name.to_lowercase(), s))
        .collect();

    let code_refs: HashSet<String> = scan.tables.iter().map(|t| t.to_lowercase()).collect();

    let mut findings = Vec::new();

    // Code refs against DB tables
    for table_name in &scan.tables {
        let lower = table_name.to_lowercase();
        match db_tables.get(&lower) {
            None => {
                let mut f = Finding::new(FindingType::MissingTable, Severity::High, "", table_name);
                f.message = format!(
                    "table {:?} referenced in code but does not exist in database",
                    table_name
                );
                findings.push(f);
            }
            Some(t) => {
                let mut f =
                    Finding::new(FindingType::CodeMatch, Severity::Info, &t.schema, table_name);
                f.message = format!(
                    "table {:?} exists in database and is referenced in code",
                    table_name
                );
                findings.push(f);
            }
        }
    }

    // Column refs against DB columns
    let db_columns: HashSet<String> = snap
        .columns
        .iter()
        .map(|c| format!("{}.{}", c.table.to_lowercase(), c.name.to_lowercase()))
        .collect();
    let mut seen_cols = HashSet::new();
    for cr in &scan.column_refs {
        let table_lower = cr.table.to_lowercase();
        if table_lower.is_empty() {
            continue;
        }
        // Only check columns for tables that exist in the DB
        let Some(table) = db_tables.get(&table_lower) else {
            continue;
        };
        let key = format!("{}.{}", table_lower, cr.column.to_lowercase());
        if !seen_cols.insert(key.clone()) {
            continue;
        }
        if !db_columns.contains(&key) {
            let mut f = Finding::new(
                FindingType::MissingColumn,
                Severity::Medium,
                &table.schema,
                &cr.table,
            );
            f.column = cr.column.clone();
            f.message = format!(
                "column {:?} referenced in code but does not exist in table {:?}",
                cr.column, cr.table
            );
            findings.push(f);
        }
    }

    // DB tables not referenced in code
    for t in &snap.tables {
        let lower = t.name.to_lowercase();
        if code_refs.contains(&lower) {
            continue;
        }
        let inactive = stats_map
            .get(&lower)
            .map(|s| s.seq_scan == 0 && s.idx_scan == 0)
            .unwrap_or(true);
        if inactive {
            let mut f =
                Finding::new(FindingType::UnreferencedTable, Severity::Low, &t.schema, &t.name);
            f.message = format!(
                "table {:?} exists in database with no activity and is not referenced in code",
                t.name
            );
            findings.push(f);
        }
    }

    // Columns used in filter/sort positions without a covering index
    findings.extend(detect_unindexed_queries(
        &scan.column_refs,
        &snap.indexes,
        &snap.tables,
    ));

    // Cluster-only issues
    findings.extend(audit(snap, opts));

    findings
}
