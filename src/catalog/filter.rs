//! Schema filtering for snapshots.

use super::Snapshot;

/// Normalize and expand schema filter values. Empty input, `all`, or `*`
/// mean "all non-system schemas" (no filtering).
pub fn resolve_schemas(schemas: &[String]) -> Vec<String> {
    if schemas.is_empty() {
        return Vec::new();
    }
    if schemas
        .iter()
        .any(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "all" | "*"))
    {
        return Vec::new();
    }
    schemas
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Narrow a snapshot to the given schemas. An empty schema list returns the
/// snapshot unchanged.
pub fn filter_snapshot(snap: Snapshot, schemas: &[String]) -> Snapshot {
    if schemas.is_empty() {
        return snap;
    }

    let include: Vec<String> = schemas.iter().map(|s| s.to_lowercase()).collect();
    let keep = |schema: &str| include.iter().any(|s| s == &schema.to_lowercase());

    Snapshot {
        tables: snap.tables.into_iter().filter(|t| keep(&t.schema)).collect(),
        columns: snap.columns.into_iter().filter(|c| keep(&c.schema)).collect(),
        indexes: snap.indexes.into_iter().filter(|i| keep(&i.schema)).collect(),
        stats: snap.stats.into_iter().filter(|s| keep(&s.schema)).collect(),
        constraints: snap
            .constraints
            .into_iter()
            .filter(|c| keep(&c.schema))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{TableInfo, TableStats};

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolve_empty_means_all() {
        assert!(resolve_schemas(&[]).is_empty());
    }

    #[test]
    fn resolve_wildcard_means_all() {
        assert!(resolve_schemas(&strings(&["all"])).is_empty());
        assert!(resolve_schemas(&strings(&["public", "*"])).is_empty());
        assert!(resolve_schemas(&strings(&["ALL"])).is_empty());
    }

    #[test]
    fn resolve_trims_and_drops_empty() {
        assert_eq!(
            resolve_schemas(&strings(&[" public ", "", "audit"])),
            strings(&["public", "audit"])
        );
    }

    #[test]
    fn filter_keeps_only_included_schemas() {
        let snap = Snapshot {
            tables: vec![
                TableInfo {
                    schema: "public".into(),
                    name: "users".into(),
                    ..Default::default()
                },
                TableInfo {
                    schema: "audit".into(),
                    name: "events".into(),
                    ..Default::default()
                },
            ],
            stats: vec![TableStats {
                schema: "audit".into(),
                name: "events".into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let filtered = filter_snapshot(snap, &strings(&["public"]));
        assert_eq!(filtered.tables.len(), 1);
        assert_eq!(filtered.tables[0].name, "users");
        assert!(filtered.stats.is_empty());
    }

    #[test]
    fn filter_is_case_insensitive() {
        let snap = Snapshot {
            tables: vec![TableInfo {
                schema: "Public".into(),
                name: "users".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let filtered = filter_snapshot(snap, &strings(&["public"]));
        assert_eq!(filtered.tables.len(), 1);
    }

    #[test]
    fn filter_empty_list_is_identity() {
        let snap = Snapshot {
            tables: vec![TableInfo::default()],
            ..Default::default()
        };
        let filtered = filter_snapshot(snap, &[]);
        assert_eq!(filtered.tables.len(), 1);
    }
}
