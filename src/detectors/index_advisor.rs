//! Unindexed query detection.
//!
//! Columns referenced in WHERE/ORDER BY positions are checked against the
//! column lists parsed from index definitions. A composite index counts as
//! covering every column it lists, which over-approximates what the planner
//! can use but keeps false positives down.

use crate::catalog::{IndexInfo, TableInfo};
use crate::models::{Finding, FindingType, Severity};
use crate::scanner::{ColumnRef, SqlContext};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

static INDEX_COLUMNS_RE: OnceLock<Regex> = OnceLock::new();

fn index_columns_re() -> &'static Regex {
    INDEX_COLUMNS_RE.get_or_init(|| Regex::new(r"\(([^)]+)\)").unwrap())
}

/// Find columns used in WHERE/ORDER BY that lack any index.
pub fn detect_unindexed_queries(
    column_refs: &[ColumnRef],
    indexes: &[IndexInfo],
    tables: &[TableInfo],
) -> Vec<Finding> {
    let indexed_cols = build_indexed_columns(indexes);

    let table_set: HashSet<String> = tables
        .iter()
        .map(|t| format!("{}.{}", t.schema.to_lowercase(), t.name.to_lowercase()))
        .collect();

    // Count references per (schema, table, column) for indexable contexts.
    // BTreeMap keeps finding order stable across runs.
    let mut ref_counts: BTreeMap<(String, String, String), usize> = BTreeMap::new();
    for cr in column_refs {
        if !is_indexable_context(cr.context) {
            continue;
        }
        if cr.table.is_empty() || cr.table.eq_ignore_ascii_case("unknown") {
            continue;
        }
        let key = (
            cr.schema.to_lowercase(),
            cr.table.to_lowercase(),
            cr.column.to_lowercase(),
        );
        *ref_counts.entry(key).or_insert(0) += 1;
    }

    let mut findings = Vec::new();
    for ((schema, table, column), count) in ref_counts {
        // Resolve unqualified refs against the public schema, drop the ref
        // when the table is unknown.
        let schema = if schema.is_empty() {
            if table_set.contains(&format!("public.{table}")) {
                "public".to_string()
            } else {
                continue;
            }
        } else {
            schema
        };

        if indexed_cols.contains(&format!("{schema}.{table}.{column}")) {
            continue;
        }

        let mut f = Finding::new(FindingType::UnindexedQuery, Severity::Medium, &schema, &table);
        f.column = column.clone();
        f.message = format!(
            "column {:?} used in WHERE/ORDER BY ({} references) but has no index",
            column, count
        );
        findings.push(f);
    }

    findings
}

/// Parse index definitions into a set of `schema.table.column` keys.
fn build_indexed_columns(indexes: &[IndexInfo]) -> HashSet<String> {
    let mut result = HashSet::new();
    for idx in indexes {
        let schema = idx.schema.to_lowercase();
        let table = idx.table.to_lowercase();
        for col in parse_index_columns(&idx.definition) {
            result.insert(format!("{schema}.{table}.{}", col.to_lowercase()));
        }
    }
    result
}

/// Extract column names from the first parenthesized list of an index
/// definition. Entries wrapping a function call are discarded: a
/// function-based index does not cover the bare column.
fn parse_index_columns(def: &str) -> Vec<String> {
    let Some(caps) = index_columns_re().captures(def) else {
        return Vec::new();
    };

    caps[1]
        .split(',')
        .filter_map(|part| {
            // Drop ASC/DESC/NULLS FIRST/NULLS LAST qualifiers
            let col = part.trim().split_whitespace().next()?;
            if col.is_empty() || col.contains('(') {
                None
            } else {
                Some(col.to_string())
            }
        })
        .collect()
}

fn is_indexable_context(ctx: SqlContext) -> bool {
    matches!(ctx, SqlContext::Where | SqlContext::OrderBy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col_ref(table: &str, column: &str, context: SqlContext) -> ColumnRef {
        ColumnRef {
            table: table.into(),
            column: column.into(),
            schema: String::new(),
            file: "app.go".into(),
            line: 1,
            context,
        }
    }

    fn index(table: &str, name: &str, def: &str) -> IndexInfo {
        IndexInfo {
            schema: "public".into(),
            table: table.into(),
            name: name.into(),
            definition: def.into(),
            ..Default::default()
        }
    }

    fn table(name: &str) -> TableInfo {
        TableInfo {
            schema: "public".into(),
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn composite_index_covers_all_columns() {
        let refs = vec![col_ref("orders", "user_id", SqlContext::Where)];
        let indexes = vec![index(
            "orders",
            "idx_orders",
            "CREATE INDEX idx_orders ON orders (user_id, created_at)",
        )];
        let findings = detect_unindexed_queries(&refs, &indexes, &[table("orders")]);
        assert!(findings.is_empty());
    }

    #[test]
    fn uncovered_column_is_flagged() {
        let refs = vec![col_ref("orders", "user_id", SqlContext::Where)];
        let indexes = vec![index(
            "orders",
            "idx_orders",
            "CREATE INDEX idx_orders ON orders (created_at)",
        )];
        let findings = detect_unindexed_queries(&refs, &indexes, &[table("orders")]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingType::UnindexedQuery);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].schema, "public");
        assert_eq!(findings[0].column, "user_id");
    }

    #[test]
    fn non_indexable_contexts_ignored() {
        let refs = vec![
            col_ref("orders", "user_id", SqlContext::Select),
            col_ref("orders", "user_id", SqlContext::Unknown),
        ];
        let findings = detect_unindexed_queries(&refs, &[], &[table("orders")]);
        assert!(findings.is_empty());
    }

    #[test]
    fn order_by_context_is_indexable() {
        let refs = vec![col_ref("orders", "created_at", SqlContext::OrderBy)];
        let findings = detect_unindexed_queries(&refs, &[], &[table("orders")]);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn unknown_table_is_dropped() {
        let refs = vec![col_ref("ghost", "user_id", SqlContext::Where)];
        let findings = detect_unindexed_queries(&refs, &[], &[table("orders")]);
        assert!(findings.is_empty());
    }

    #[test]
    fn empty_table_ref_is_dropped() {
        let refs = vec![col_ref("", "user_id", SqlContext::Where)];
        let findings = detect_unindexed_queries(&refs, &[], &[table("orders")]);
        assert!(findings.is_empty());
    }

    #[test]
    fn reference_count_in_message() {
        let refs = vec![
            col_ref("orders", "user_id", SqlContext::Where),
            col_ref("orders", "user_id", SqlContext::Where),
            col_ref("orders", "user_id", SqlContext::OrderBy),
        ];
        let findings = detect_unindexed_queries(&refs, &[], &[table("orders")]);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("3 references"));
    }

    #[test]
    fn parse_index_columns_variants() {
        assert_eq!(
            parse_index_columns("CREATE INDEX i ON t (a, b)"),
            vec!["a", "b"]
        );
        assert_eq!(
            parse_index_columns("CREATE INDEX i ON t (a DESC, b ASC)"),
            vec!["a", "b"]
        );
        assert_eq!(
            parse_index_columns("CREATE INDEX i ON t (created_at DESC NULLS LAST)"),
            vec!["created_at"]
        );
        // The first paren group of a function-based index ends inside the
        // call, so nothing usable comes out of it
        assert!(parse_index_columns("CREATE INDEX i ON t (lower(email), id)").is_empty());
        assert!(parse_index_columns("no parens here").is_empty());
    }
}
