//! PostgreSQL catalog metadata.
//!
//! The detectors consume an in-memory [`Snapshot`]; only the inspector talks
//! to the database.

mod filter;
mod inspector;
mod retry;

pub use filter::{filter_snapshot, resolve_schemas};
pub use inspector::Inspector;
pub use retry::CatalogError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A table from information_schema + pg_class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    /// BASE TABLE, VIEW, etc.
    #[serde(rename = "type")]
    pub kind: String,
    /// From pg_class.reltuples.
    pub estimated_rows: i64,
    /// From pg_total_relation_size.
    pub size_bytes: i64,
}

/// A table column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub ordinal_position: i32,
    pub data_type: String,
    pub is_nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_default: Option<String>,
}

/// An index with its SQL definition and usage stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub definition: String,
    pub size_bytes: i64,
    pub index_scans: i64,
    pub tup_read: i64,
    pub tup_fetch: i64,
}

/// Usage statistics from pg_stat_user_tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    pub schema: String,
    pub name: String,
    pub seq_scan: i64,
    pub seq_tup_read: i64,
    pub idx_scan: i64,
    pub idx_tup_fetch: i64,
    pub live_tuples: i64,
    pub dead_tuples: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_vacuum: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_autovacuum: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_analyze: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_autoanalyze: Option<DateTime<Utc>>,
    pub vacuum_count: i64,
    pub autovacuum_count: i64,
    pub analyze_count: i64,
    pub autoanalyze_count: i64,
}

/// A table constraint. `kind` uses the pg_constraint codes:
/// p = primary key, u = unique, f = foreign key, c = check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintInfo {
    pub schema: String,
    pub table: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_table: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ref_columns: Vec<String>,
}

/// The complete catalog metadata for a database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub tables: Vec<TableInfo>,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
    pub stats: Vec<TableStats>,
    pub constraints: Vec<ConstraintInfo>,
}

impl Snapshot {
    /// Number of distinct schemas across the snapshot's tables.
    pub fn schema_count(&self) -> usize {
        let set: std::collections::HashSet<&str> =
            self.tables.iter().map(|t| t.schema.as_str()).collect();
        set.len()
    }
}
