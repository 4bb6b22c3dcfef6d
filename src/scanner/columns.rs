//! Column reference patterns.
//!
//! Runs after the table patterns on the same logical line. Columns matched in
//! WHERE or ORDER/GROUP BY positions carry those contexts; the unindexed-query
//! detector keys off them.

use super::patterns::is_sql_keyword;
use super::SqlContext;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnMatch {
    pub table: String,
    pub column: String,
    pub schema: String,
    pub context: SqlContext,
}

static DOTTED_RE: OnceLock<Regex> = OnceLock::new();
static SELECT_LIST_RE: OnceLock<Regex> = OnceLock::new();
static WHERE_RE: OnceLock<Regex> = OnceLock::new();
static ORDER_BY_RE: OnceLock<Regex> = OnceLock::new();
static INSERT_COLS_RE: OnceLock<Regex> = OnceLock::new();

fn dotted_re() -> &'static Regex {
    DOTTED_RE.get_or_init(|| Regex::new(r"\b([A-Za-z_]\w*)\.([A-Za-z_]\w*)\b").unwrap())
}

fn select_list_re() -> &'static Regex {
    SELECT_LIST_RE.get_or_init(|| Regex::new(r"(?i)\bSELECT\s+(.+?)\s+FROM\b").unwrap())
}

fn where_re() -> &'static Regex {
    WHERE_RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:WHERE|AND|OR)\s+(?:([A-Za-z_]\w*)\.)?([A-Za-z_]\w*)\s*(?:=|!=|<>|<|>|\bIS\b|\bIN\b|\bLIKE\b|\bBETWEEN\b|\bNOT\b)",
        )
        .unwrap()
    })
}

fn order_by_re() -> &'static Regex {
    ORDER_BY_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:ORDER|GROUP)\s+BY\s+(?:([A-Za-z_]\w*)\.)?([A-Za-z_]\w*)").unwrap()
    })
}

fn insert_cols_re() -> &'static Regex {
    INSERT_COLS_RE.get_or_init(|| {
        Regex::new(r"(?i)\bINSERT\s+INTO\s+(?:([A-Za-z_]\w*)\.)?([A-Za-z_]\w*)\s*\(([^)]+)\)")
            .unwrap()
    })
}

/// SQL function names that look like columns in casual matching.
fn is_sql_function(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "count"
            | "sum"
            | "avg"
            | "min"
            | "max"
            | "coalesce"
            | "nullif"
            | "greatest"
            | "least"
            | "cast"
            | "now"
            | "row_number"
            | "rank"
            | "array_agg"
            | "string_agg"
            | "json_agg"
            | "jsonb_agg"
            | "lower"
            | "upper"
            | "length"
            | "substring"
            | "trim"
            | "concat"
            | "abs"
            | "round"
            | "extract"
            | "date_trunc"
            | "to_char"
            | "exists"
            | "not"
            | "case"
    )
}

pub(crate) fn is_valid_column(name: &str) -> bool {
    if name.len() < 2 || name.len() > 120 {
        return false;
    }
    !is_sql_keyword(name) && !is_sql_function(name)
}

/// Extract column references from a single line of code.
///
/// Matches are deduplicated by `(table, column, context)` within the line.
pub(crate) fn scan_line_columns(line: &str) -> Vec<ColumnMatch> {
    let mut matches: Vec<ColumnMatch> = Vec::new();

    let mut push = |table: &str, column: &str, schema: &str, context: SqlContext| {
        if !is_valid_column(column) {
            return;
        }
        let m = ColumnMatch {
            table: table.to_string(),
            column: column.to_string(),
            schema: schema.to_string(),
            context,
        };
        if !matches
            .iter()
            .any(|e| e.table == m.table && e.column == m.column && e.context == m.context)
        {
            matches.push(m);
        }
    };

    // Dotted references: users.email. The second identifier must look like a
    // column, not a method call (uppercase initial rejects fmt.Println).
    for caps in dotted_re().captures_iter(line) {
        let table = &caps[1];
        let column = &caps[2];
        if is_sql_keyword(table) {
            continue;
        }
        if column.starts_with(|c: char| c.is_ascii_uppercase()) {
            continue;
        }
        push(table, column, "", SqlContext::Unknown);
    }

    // SELECT col, col, ... FROM
    if let Some(caps) = select_list_re().captures(line) {
        for entry in caps[1].split(',') {
            if let Some((table, column)) = parse_select_entry(entry) {
                push(&table, &column, "", SqlContext::Select);
            }
        }
    }

    // WHERE/AND/OR col <op>
    for caps in where_re().captures_iter(line) {
        let table = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        push(table, &caps[2], "", SqlContext::Where);
    }

    // ORDER BY col / GROUP BY col
    for caps in order_by_re().captures_iter(line) {
        let table = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        push(table, &caps[2], "", SqlContext::OrderBy);
    }

    // INSERT INTO tbl (col, col, ...)
    if let Some(caps) = insert_cols_re().captures(line) {
        let schema = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let table = caps[2].to_string();
        for entry in caps[3].split(',') {
            let col = entry.trim();
            if col.contains('(') {
                continue;
            }
            push(&table, col, schema, SqlContext::Insert);
        }
    }

    matches
}

/// Parse one entry of a SELECT column list into `(table, column)`.
///
/// Strips `AS alias`, skips `*` and function calls, and splits `alias.col`
/// into a qualified reference.
fn parse_select_entry(entry: &str) -> Option<(String, String)> {
    let entry = entry.trim();
    if entry.is_empty() || entry == "*" || entry.contains('(') {
        return None;
    }

    // Drop "AS alias" and implicit aliases: keep the first token only.
    let mut tokens = entry.split_whitespace();
    let mut first = tokens.next()?;
    if first.eq_ignore_ascii_case("distinct") {
        first = tokens.next()?;
    }

    match first.split_once('.') {
        Some((table, column)) => {
            if table.is_empty() || column.is_empty() || column == "*" {
                None
            } else {
                Some((table.to_string(), column.to_string()))
            }
        }
        None => Some((String::new(), first.to_string())),
    }
}
