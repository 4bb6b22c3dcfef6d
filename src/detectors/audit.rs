//! Catalog-only detectors: unused tables and indexes, bloat, vacuum age,
//! missing primary keys, duplicate indexes.

use super::{table_key, AuditOptions};
use crate::catalog::{IndexInfo, Snapshot, TableInfo, TableStats};
use crate::models::{Finding, FindingType, Severity};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

/// Analyze a catalog snapshot and return findings.
///
/// Exclusions (`exclude_tables`, `exclude_schemas`) are applied to the
/// detector inputs, not their outputs.
pub fn audit(snap: &Snapshot, opts: AuditOptions) -> Vec<Finding> {
    let opts = opts.with_defaults();

    let exclude_table: HashSet<String> = opts
        .exclude_tables
        .iter()
        .map(|t| t.to_lowercase())
        .collect();
    let exclude_schema: HashSet<String> = opts
        .exclude_schemas
        .iter()
        .map(|s| s.to_lowercase())
        .collect();
    let excluded = |schema: &str, table: &str| {
        exclude_table.contains(&table.to_lowercase()) || exclude_schema.contains(&schema.to_lowercase())
    };

    let pk_set: HashSet<String> = snap
        .constraints
        .iter()
        .filter(|c| c.kind == "p")
        .map(|c| table_key(&c.schema, &c.table))
        .collect();

    let table_sizes: HashMap<String, i64> = snap
        .tables
        .iter()
        .filter(|t| t.size_bytes > 0)
        .map(|t| (table_key(&t.schema, &t.name), t.size_bytes))
        .collect();

    let stats: Vec<&TableStats> = snap
        .stats
        .iter()
        .filter(|s| !excluded(&s.schema, &s.name))
        .collect();
    let tables: Vec<&TableInfo> = snap
        .tables
        .iter()
        .filter(|t| !excluded(&t.schema, &t.name))
        .collect();
    let indexes: Vec<&IndexInfo> = snap
        .indexes
        .iter()
        .filter(|i| !excluded(&i.schema, &i.table))
        .collect();

    let vacuum_threshold = Duration::days(opts.vacuum_days);

    let mut findings = Vec::new();
    findings.extend(detect_unused_tables(&stats));
    findings.extend(detect_unused_indexes(&indexes, opts.unused_index_min_bytes));
    findings.extend(detect_bloated_indexes(&indexes, &table_sizes, opts.bloat_min_bytes));
    findings.extend(detect_missing_vacuum(&stats, Utc::now(), vacuum_threshold));
    findings.extend(detect_no_primary_key(&tables, &pk_set));
    findings.extend(detect_duplicate_indexes(&indexes));
    findings
}

fn detect_unused_tables(stats: &[&TableStats]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for s in stats {
        if s.seq_scan == 0 && s.idx_scan == 0 {
            let mut f = Finding::new(FindingType::UnusedTable, Severity::High, &s.schema, &s.name);
            f.message = "table has no sequential or index scans".to_string();
            f.detail.insert("live_tuples".into(), s.live_tuples.to_string());
            f.detail.insert("dead_tuples".into(), s.dead_tuples.to_string());
            if let Some(t) = s.last_vacuum {
                f.detail.insert("last_vacuum".into(), t.to_rfc3339());
            }
            if let Some(t) = s.last_autovacuum {
                f.detail.insert("last_autovacuum".into(), t.to_rfc3339());
            }
            findings.push(f);
        }
    }
    findings
}

fn detect_unused_indexes(indexes: &[&IndexInfo], min_size_bytes: i64) -> Vec<Finding> {
    let mut findings = Vec::new();
    for idx in indexes {
        if idx.index_scans == 0 && idx.size_bytes > min_size_bytes {
            let mut f =
                Finding::new(FindingType::UnusedIndex, Severity::Medium, &idx.schema, &idx.table);
            f.index = idx.name.clone();
            f.message = format!(
                "index {:?} has never been used ({})",
                idx.name,
                format_bytes(idx.size_bytes)
            );
            f.detail.insert("size_bytes".into(), idx.size_bytes.to_string());
            f.detail.insert("size".into(), format_bytes(idx.size_bytes));
            f.detail.insert("idx_scan".into(), idx.index_scans.to_string());
            findings.push(f);
        }
    }
    findings
}

fn detect_bloated_indexes(
    indexes: &[&IndexInfo],
    table_sizes: &HashMap<String, i64>,
    bloat_min: i64,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for idx in indexes {
        let Some(&table_size) = table_sizes.get(&table_key(&idx.schema, &idx.table)) else {
            continue;
        };
        if table_size <= 0 || idx.size_bytes <= bloat_min {
            continue;
        }
        if idx.size_bytes > table_size {
            let mut f =
                Finding::new(FindingType::BloatedIndex, Severity::Low, &idx.schema, &idx.table);
            f.index = idx.name.clone();
            f.message = format!(
                "index {:?} ({}) is larger than table ({})",
                idx.name,
                format_bytes(idx.size_bytes),
                format_bytes(table_size)
            );
            f.detail
                .insert("index_size_bytes".into(), idx.size_bytes.to_string());
            f.detail.insert("index_size".into(), format_bytes(idx.size_bytes));
            f.detail
                .insert("table_size_bytes".into(), table_size.to_string());
            f.detail.insert("table_size".into(), format_bytes(table_size));
            findings.push(f);
        }
    }
    findings
}

fn detect_missing_vacuum(
    stats: &[&TableStats],
    now: DateTime<Utc>,
    threshold: Duration,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for s in stats {
        // Only flag active tables
        if s.seq_scan == 0 && s.idx_scan == 0 {
            continue;
        }

        let mut detail = std::collections::BTreeMap::new();
        detail.insert("dead_tuples".to_string(), s.dead_tuples.to_string());
        detail.insert("live_tuples".to_string(), s.live_tuples.to_string());
        if let Some(t) = s.last_autovacuum {
            detail.insert("last_autovacuum".to_string(), t.to_rfc3339());
        }

        match s.last_autovacuum {
            None => {
                let mut f = Finding::new(
                    FindingType::MissingVacuum,
                    Severity::Low,
                    &s.schema,
                    &s.name,
                );
                f.message = "active table has no autovacuum history".to_string();
                f.detail = detail;
                findings.push(f);
            }
            Some(last) if now - last > threshold => {
                let mut f = Finding::new(
                    FindingType::MissingVacuum,
                    Severity::Low,
                    &s.schema,
                    &s.name,
                );
                f.message = format!("last autovacuum was {} days ago", (now - last).num_days());
                f.detail = detail;
                findings.push(f);
            }
            Some(_) => {}
        }
    }
    findings
}

fn detect_no_primary_key(tables: &[&TableInfo], pk_set: &HashSet<String>) -> Vec<Finding> {
    let mut findings = Vec::new();
    for t in tables {
        if !pk_set.contains(&table_key(&t.schema, &t.name)) {
            let mut f =
                Finding::new(FindingType::NoPrimaryKey, Severity::Medium, &t.schema, &t.name);
            f.message = "table has no primary key".to_string();
            findings.push(f);
        }
    }
    findings
}

fn detect_duplicate_indexes(indexes: &[&IndexInfo]) -> Vec<Finding> {
    let mut by_table: HashMap<String, Vec<&IndexInfo>> = HashMap::new();
    for idx in indexes {
        by_table
            .entry(table_key(&idx.schema, &idx.table))
            .or_default()
            .push(idx);
    }

    let mut keys: Vec<&String> = by_table.keys().collect();
    keys.sort();

    let mut findings = Vec::new();
    for key in keys {
        let group = &by_table[key];
        for i in 0..group.len() {
            for j in i + 1..group.len() {
                if normalize_def(&group[i].definition) == normalize_def(&group[j].definition) {
                    let mut f = Finding::new(
                        FindingType::DuplicateIndex,
                        Severity::Low,
                        &group[i].schema,
                        &group[i].table,
                    );
                    f.index = group[j].name.clone();
                    f.message = format!(
                        "index {:?} has the same definition as {:?}",
                        group[j].name, group[i].name
                    );
                    findings.push(f);
                }
            }
        }
    }
    findings
}

/// Strip the index name and whitespace from a definition so that
/// `CREATE INDEX idx_a ON t (col)` and `CREATE INDEX idx_b ON t (col)`
/// compare as equal.
pub(crate) fn normalize_def(def: &str) -> String {
    let normalized = def.split_whitespace().collect::<Vec<_>>().join(" ");
    match normalized.to_uppercase().find(" ON ") {
        Some(idx) => normalized[idx..].to_string(),
        None => normalized,
    }
}

pub(crate) fn format_bytes(b: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = 1024 * KB;
    const GB: i64 = 1024 * MB;
    match b {
        _ if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
        _ if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        _ if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        _ => format!("{b} bytes"),
    }
}
