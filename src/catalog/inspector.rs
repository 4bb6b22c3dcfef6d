//! Catalog inspector.
//!
//! Reads table, column, index, statistics, and constraint metadata from
//! information_schema and pg_catalog. System schemas (pg_catalog,
//! information_schema, pg_toast) are always excluded.

use super::retry::{connect_with_retry, CatalogError};
use super::{ColumnInfo, ConstraintInfo, IndexInfo, Snapshot, TableInfo, TableStats};
use sqlx::postgres::PgPool;
use sqlx::Row;

const TABLES_QUERY: &str = r#"
    SELECT
        t.table_schema,
        t.table_name,
        t.table_type,
        COALESCE(c.reltuples::bigint, 0) AS estimated_rows,
        COALESCE(pg_catalog.pg_total_relation_size(c.oid), 0) AS size_bytes
    FROM information_schema.tables t
    LEFT JOIN pg_catalog.pg_class c
        ON c.relname = t.table_name
        AND c.relnamespace = (
            SELECT oid FROM pg_catalog.pg_namespace WHERE nspname = t.table_schema
        )
    WHERE t.table_schema NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
        AND t.table_type = 'BASE TABLE'
    ORDER BY t.table_schema, t.table_name"#;

const COLUMNS_QUERY: &str = r#"
    SELECT
        table_schema,
        table_name,
        column_name,
        ordinal_position::int4 AS ordinal_position,
        data_type,
        is_nullable = 'YES' AS is_nullable,
        column_default
    FROM information_schema.columns
    WHERE table_schema NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
    ORDER BY table_schema, table_name, ordinal_position"#;

const INDEXES_QUERY: &str = r#"
    SELECT
        pi.schemaname,
        pi.tablename,
        pi.indexname,
        pi.indexdef,
        COALESCE(pg_catalog.pg_relation_size(si.indexrelid), 0) AS size_bytes,
        COALESCE(si.idx_scan, 0) AS idx_scan,
        COALESCE(si.idx_tup_read, 0) AS idx_tup_read,
        COALESCE(si.idx_tup_fetch, 0) AS idx_tup_fetch
    FROM pg_catalog.pg_indexes pi
    LEFT JOIN pg_catalog.pg_stat_user_indexes si
        ON si.indexrelname = pi.indexname
        AND si.schemaname = pi.schemaname
    WHERE pi.schemaname NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
    ORDER BY pi.schemaname, pi.tablename, pi.indexname"#;

const STATS_QUERY: &str = r#"
    SELECT
        schemaname,
        relname,
        COALESCE(seq_scan, 0) AS seq_scan,
        COALESCE(seq_tup_read, 0) AS seq_tup_read,
        COALESCE(idx_scan, 0) AS idx_scan,
        COALESCE(idx_tup_fetch, 0) AS idx_tup_fetch,
        COALESCE(n_live_tup, 0) AS n_live_tup,
        COALESCE(n_dead_tup, 0) AS n_dead_tup,
        last_vacuum,
        last_autovacuum,
        last_analyze,
        last_autoanalyze,
        COALESCE(vacuum_count, 0) AS vacuum_count,
        COALESCE(autovacuum_count, 0) AS autovacuum_count,
        COALESCE(analyze_count, 0) AS analyze_count,
        COALESCE(autoanalyze_count, 0) AS autoanalyze_count
    FROM pg_catalog.pg_stat_user_tables
    ORDER BY schemaname, relname"#;

const CONSTRAINTS_QUERY: &str = r#"
    SELECT
        n.nspname AS schema,
        rel.relname AS table_name,
        c.conname AS name,
        c.contype::text AS type,
        COALESCE(
            ARRAY(
                SELECT a.attname::text
                FROM unnest(c.conkey) WITH ORDINALITY AS u(attnum, ord)
                JOIN pg_catalog.pg_attribute a
                    ON a.attrelid = c.conrelid AND a.attnum = u.attnum
                ORDER BY u.ord
            ),
            '{}'
        ) AS columns,
        frel.relname AS ref_table,
        COALESCE(
            ARRAY(
                SELECT a.attname::text
                FROM unnest(c.confkey) WITH ORDINALITY AS u(attnum, ord)
                JOIN pg_catalog.pg_attribute a
                    ON a.attrelid = c.confrelid AND a.attnum = u.attnum
                ORDER BY u.ord
            ),
            '{}'
        ) AS ref_columns
    FROM pg_catalog.pg_constraint c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.connamespace
    JOIN pg_catalog.pg_class rel ON rel.oid = c.conrelid
    LEFT JOIN pg_catalog.pg_class frel ON frel.oid = c.confrelid
    WHERE n.nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
        AND c.conrelid > 0
    ORDER BY n.nspname, rel.relname, c.conname"#;

/// Reads PostgreSQL catalog metadata and statistics.
pub struct Inspector {
    pool: PgPool,
}

impl Inspector {
    /// Connect to PostgreSQL and verify the connection.
    pub async fn connect(url: &str) -> Result<Self, CatalogError> {
        let pool = connect_with_retry(url).await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(CatalogError::Connection)?;
        Ok(Inspector { pool })
    }

    /// Release the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// The PostgreSQL server version string.
    pub async fn server_version(&self) -> Result<String, CatalogError> {
        let row = sqlx::query("SHOW server_version")
            .fetch_one(&self.pool)
            .await
            .map_err(CatalogError::Query)?;
        row.try_get(0).map_err(CatalogError::Query)
    }

    /// Gather the full catalog snapshot for the connected database.
    pub async fn snapshot(&self) -> Result<Snapshot, CatalogError> {
        Ok(Snapshot {
            tables: self.tables().await?,
            columns: self.columns().await?,
            indexes: self.indexes().await?,
            stats: self.table_stats().await?,
            constraints: self.constraints().await?,
        })
    }

    async fn tables(&self) -> Result<Vec<TableInfo>, CatalogError> {
        let rows = sqlx::query(TABLES_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(CatalogError::Query)?;

        rows.iter()
            .map(|row| {
                Ok(TableInfo {
                    schema: row.try_get("table_schema")?,
                    name: row.try_get("table_name")?,
                    kind: row.try_get("table_type")?,
                    estimated_rows: row.try_get("estimated_rows")?,
                    size_bytes: row.try_get("size_bytes")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(CatalogError::Query)
    }

    async fn columns(&self) -> Result<Vec<ColumnInfo>, CatalogError> {
        let rows = sqlx::query(COLUMNS_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(CatalogError::Query)?;

        rows.iter()
            .map(|row| {
                Ok(ColumnInfo {
                    schema: row.try_get("table_schema")?,
                    table: row.try_get("table_name")?,
                    name: row.try_get("column_name")?,
                    ordinal_position: row.try_get("ordinal_position")?,
                    data_type: row.try_get("data_type")?,
                    is_nullable: row.try_get("is_nullable")?,
                    column_default: row.try_get("column_default")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(CatalogError::Query)
    }

    async fn indexes(&self) -> Result<Vec<IndexInfo>, CatalogError> {
        let rows = sqlx::query(INDEXES_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(CatalogError::Query)?;

        rows.iter()
            .map(|row| {
                Ok(IndexInfo {
                    schema: row.try_get("schemaname")?,
                    table: row.try_get("tablename")?,
                    name: row.try_get("indexname")?,
                    definition: row.try_get("indexdef")?,
                    size_bytes: row.try_get("size_bytes")?,
                    index_scans: row.try_get("idx_scan")?,
                    tup_read: row.try_get("idx_tup_read")?,
                    tup_fetch: row.try_get("idx_tup_fetch")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(CatalogError::Query)
    }

    async fn table_stats(&self) -> Result<Vec<TableStats>, CatalogError> {
        let rows = sqlx::query(STATS_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(CatalogError::Query)?;

        rows.iter()
            .map(|row| {
                Ok(TableStats {
                    schema: row.try_get("schemaname")?,
                    name: row.try_get("relname")?,
                    seq_scan: row.try_get("seq_scan")?,
                    seq_tup_read: row.try_get("seq_tup_read")?,
                    idx_scan: row.try_get("idx_scan")?,
                    idx_tup_fetch: row.try_get("idx_tup_fetch")?,
                    live_tuples: row.try_get("n_live_tup")?,
                    dead_tuples: row.try_get("n_dead_tup")?,
                    last_vacuum: row.try_get("last_vacuum")?,
                    last_autovacuum: row.try_get("last_autovacuum")?,
                    last_analyze: row.try_get("last_analyze")?,
                    last_autoanalyze: row.try_get("last_autoanalyze")?,
                    vacuum_count: row.try_get("vacuum_count")?,
                    autovacuum_count: row.try_get("autovacuum_count")?,
                    analyze_count: row.try_get("analyze_count")?,
                    autoanalyze_count: row.try_get("autoanalyze_count")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(CatalogError::Query)
    }

    async fn constraints(&self) -> Result<Vec<ConstraintInfo>, CatalogError> {
        let rows = sqlx::query(CONSTRAINTS_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(CatalogError::Query)?;

        rows.iter()
            .map(|row| {
                Ok(ConstraintInfo {
                    schema: row.try_get("schema")?,
                    table: row.try_get("table_name")?,
                    name: row.try_get("name")?,
                    kind: row.try_get("type")?,
                    columns: row.try_get("columns")?,
                    ref_table: row.try_get("ref_table")?,
                    ref_columns: row.try_get::<Option<Vec<String>>, _>("ref_columns")?.unwrap_or_default(),
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(CatalogError::Query)
    }
}
