//! Code repository scanner.
//!
//! Walks a source tree and extracts table/column references from SQL strings,
//! ORM declarations, and migration files. Matching is lexical: no AST is
//! built, so results are heuristic and meant to be suppressible downstream.

mod buffer;
mod columns;
mod parallel;
mod patterns;

pub use parallel::scan_parallel;

use crate::suppress::has_inline_ignore;
use anyhow::{Context as _, Result};
use buffer::SqlBuffer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use walkdir::WalkDir;

/// How a table reference was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Sql,
    Orm,
    Migration,
}

/// SQL operation context of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlContext {
    #[serde(rename = "SELECT")]
    Select,
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "DDL")]
    Ddl,
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "WHERE")]
    Where,
    #[serde(rename = "ORDER_BY")]
    OrderBy,
}

/// A single reference to a database table found in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRef {
    pub table: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,
    pub file: String,
    pub line: u32,
    pub pattern: PatternKind,
    pub context: SqlContext,
}

/// A single reference to a database column found in code.
///
/// `table` may be empty when the reference is unqualified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    #[serde(default)]
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,
    pub file: String,
    pub line: u32,
    pub context: SqlContext,
}

/// All table and column references found in a code repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub repo_path: String,
    #[serde(default)]
    pub refs: Vec<TableRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_refs: Vec<ColumnRef>,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    pub files_scanned: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub files_skipped: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

const SUPPORTED_EXTENSIONS: &[&str] = &[
    "go", "py", "js", "ts", "jsx", "tsx", "java", "rb", "sql", "rs", "prisma",
];

const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    "bin",
];

pub(crate) fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub(crate) fn is_skip_dir(name: &str) -> bool {
    SKIP_DIRS.contains(&name)
}

/// Walk a code repository sequentially and extract SQL table references.
pub fn scan(repo_path: &Path) -> Result<ScanResult> {
    let mut result = ScanResult {
        repo_path: repo_path.display().to_string(),
        ..Default::default()
    };

    let walker = WalkDir::new(repo_path).into_iter().filter_entry(|e| {
        !(e.file_type().is_dir() && e.file_name().to_str().is_some_and(is_skip_dir))
    });

    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", repo_path.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_supported(path) {
            result.files_skipped += 1;
            continue;
        }

        let rel = relative_path(repo_path, path);
        let (refs, col_refs) =
            scan_file(path, &rel).with_context(|| format!("scan {}", rel))?;
        result.refs.extend(refs);
        result.column_refs.extend(col_refs);
        result.files_scanned += 1;
    }

    result.tables = unique_tables(&result.refs);
    result.columns = unique_columns(&result.column_refs);
    Ok(result)
}

pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Scan a single file, returning its table and column references.
pub(crate) fn scan_file(path: &Path, rel_path: &str) -> Result<(Vec<TableRef>, Vec<ColumnRef>)> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let mut buf = SqlBuffer::new();
    let mut refs = Vec::new();
    let mut col_refs = Vec::new();

    let mut scan_text = |text: &str, line: u32| {
        if has_inline_ignore(text) {
            return;
        }
        for m in patterns::scan_line(text) {
            refs.push(TableRef {
                table: m.table,
                schema: m.schema,
                file: rel_path.to_string(),
                line,
                pattern: m.kind,
                context: m.context,
            });
        }
        for cm in columns::scan_line_columns(text) {
            col_refs.push(ColumnRef {
                table: cm.table,
                column: cm.column,
                schema: cm.schema,
                file: rel_path.to_string(),
                line,
                context: cm.context,
            });
        }
    };

    let mut line_num: u32 = 0;
    if ext == "sql" {
        for line in reader.lines() {
            let line = line?;
            line_num += 1;
            for stmt in buf.feed_sql(line_num, &line) {
                scan_text(&stmt.text, stmt.line);
            }
        }
    } else {
        for line in reader.lines() {
            let line = line?;
            line_num += 1;

            let (stmt, buffered) = buf.feed_code(line_num, &line, &ext);
            if let Some(stmt) = stmt {
                scan_text(&stmt.text, stmt.line);
            }
            if !buffered {
                scan_text(&line, line_num);
            }
        }
    }

    if let Some(stmt) = buf.flush() {
        scan_text(&stmt.text, stmt.line);
    }

    Ok((refs, col_refs))
}

/// Sorted unique lowercased table names.
pub(crate) fn unique_tables(refs: &[TableRef]) -> Vec<String> {
    let set: BTreeSet<String> = refs.iter().map(|r| r.table.to_lowercase()).collect();
    set.into_iter().collect()
}

/// Sorted unique lowercased `table.column` keys.
pub(crate) fn unique_columns(refs: &[ColumnRef]) -> Vec<String> {
    let set: BTreeSet<String> = refs
        .iter()
        .map(|r| format!("{}.{}", r.table.to_lowercase(), r.column.to_lowercase()))
        .collect();
    set.into_iter().collect()
}
