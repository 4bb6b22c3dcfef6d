//! Table reference patterns.
//!
//! All patterns operate on a single logical line (multiline SQL is normalized
//! by the buffer first) and are case-insensitive. Keyword rejection is what
//! keeps the false-positive rate tolerable.

use super::{PatternKind, SqlContext};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableMatch {
    pub table: String,
    pub schema: String,
    pub kind: PatternKind,
    pub context: SqlContext,
}

struct TablePattern {
    re: Regex,
    table_group: usize,
    schema_group: Option<usize>,
    kind: PatternKind,
    context: SqlContext,
}

fn pattern(
    re: &str,
    schema_group: Option<usize>,
    table_group: usize,
    kind: PatternKind,
    context: SqlContext,
) -> TablePattern {
    TablePattern {
        re: Regex::new(re).expect("invalid table pattern"),
        table_group,
        schema_group,
        kind,
        context,
    }
}

static TABLE_PATTERNS: OnceLock<Vec<TablePattern>> = OnceLock::new();

fn table_patterns() -> &'static [TablePattern] {
    TABLE_PATTERNS.get_or_init(|| {
        use PatternKind::*;
        use SqlContext::*;
        vec![
            // SQL: SELECT ... FROM table / FROM schema.table
            pattern(r"(?i)\bFROM\s+(\w+)\.(\w+)", Some(1), 2, Sql, Select),
            pattern(r"(?i)\bFROM\s+(\w+)", None, 1, Sql, Select),
            // SQL: JOIN variants (LEFT/RIGHT/INNER/OUTER/CROSS/FULL)
            pattern(r"(?i)\bJOIN\s+(\w+)\.(\w+)", Some(1), 2, Sql, Select),
            pattern(r"(?i)\bJOIN\s+(\w+)", None, 1, Sql, Select),
            // SQL: INSERT INTO table
            pattern(r"(?i)\bINSERT\s+INTO\s+(\w+)\.(\w+)", Some(1), 2, Sql, Insert),
            pattern(r"(?i)\bINSERT\s+INTO\s+(\w+)", None, 1, Sql, Insert),
            // SQL: UPDATE table SET
            pattern(r"(?i)\bUPDATE\s+(\w+)\.(\w+)\s+SET\b", Some(1), 2, Sql, Update),
            pattern(r"(?i)\bUPDATE\s+(\w+)\s+SET\b", None, 1, Sql, Update),
            // SQL: DELETE FROM table
            pattern(r"(?i)\bDELETE\s+FROM\s+(\w+)\.(\w+)", Some(1), 2, Sql, Delete),
            pattern(r"(?i)\bDELETE\s+FROM\s+(\w+)", None, 1, Sql, Delete),
            // ORM: SQLAlchemy __tablename__
            pattern(r#"__tablename__\s*=\s*['"](\w+)['"]"#, None, 1, Orm, Unknown),
            // ORM: Django db_table
            pattern(r#"db_table\s*=\s*['"](\w+)['"]"#, None, 1, Orm, Unknown),
            // ORM: GORM TableName() method
            pattern(r#"TableName\(\)\s*.*return\s*["'](\w+)["']"#, None, 1, Orm, Unknown),
            // ORM: GORM .Table("name")
            pattern(r#"\.Table\(["'](\w+)["']\)"#, None, 1, Orm, Unknown),
            // ORM: Prisma @@map("name")
            pattern(r#"@@map\(["'](\w+)["']\)"#, None, 1, Orm, Unknown),
            // Migration: CREATE TABLE [IF NOT EXISTS] table
            pattern(
                r"(?i)\bCREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(\w+)\.(\w+)",
                Some(1),
                2,
                Migration,
                Ddl,
            ),
            pattern(
                r"(?i)\bCREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(\w+)",
                None,
                1,
                Migration,
                Ddl,
            ),
            // Migration: ALTER TABLE [IF EXISTS] table
            pattern(
                r"(?i)\bALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?(\w+)\.(\w+)",
                Some(1),
                2,
                Migration,
                Ddl,
            ),
            pattern(
                r"(?i)\bALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?(\w+)",
                None,
                1,
                Migration,
                Ddl,
            ),
            // Migration: DROP TABLE [IF EXISTS] table
            pattern(
                r"(?i)\bDROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?(\w+)",
                None,
                1,
                Migration,
                Ddl,
            ),
            // Migration: CREATE [UNIQUE] INDEX name ON table
            pattern(
                r"(?i)\bCREATE\s+(?:UNIQUE\s+)?INDEX\s+\w+\s+ON\s+(\w+)",
                None,
                1,
                Migration,
                Ddl,
            ),
        ]
    })
}

/// SQL keywords that must not be treated as table names.
pub(crate) fn is_sql_keyword(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "select"
            | "from"
            | "where"
            | "and"
            | "or"
            | "not"
            | "in"
            | "is"
            | "null"
            | "as"
            | "on"
            | "set"
            | "values"
            | "into"
            | "join"
            | "left"
            | "right"
            | "inner"
            | "outer"
            | "cross"
            | "full"
            | "group"
            | "by"
            | "order"
            | "having"
            | "limit"
            | "offset"
            | "union"
            | "all"
            | "distinct"
            | "case"
            | "when"
            | "then"
            | "else"
            | "end"
            | "exists"
            | "between"
            | "like"
            | "true"
            | "false"
            | "table"
            | "index"
            | "create"
            | "alter"
            | "drop"
            | "insert"
            | "update"
            | "delete"
            | "begin"
            | "commit"
            | "rollback"
            | "if"
            | "with"
            | "returning"
            // Common false positives from import statements
            | "sqlalchemy"
            | "django"
            | "gorm"
            | "prisma"
            | "import"
            | "package"
            | "require"
            | "include"
    )
}

pub(crate) fn is_valid_table_name(name: &str) -> bool {
    if name.len() < 2 || name.len() > 120 {
        return false;
    }
    !is_sql_keyword(name)
}

/// Extract table references from a single line of code.
///
/// Matches are deduplicated by `(schema, table, context)` within the line.
pub(crate) fn scan_line(line: &str) -> Vec<TableMatch> {
    let mut matches = Vec::new();
    let mut seen: Vec<(String, String, SqlContext)> = Vec::new();

    for p in table_patterns() {
        for caps in p.re.captures_iter(line) {
            let table = match caps.get(p.table_group) {
                Some(m) => m.as_str().to_string(),
                None => continue,
            };
            if !is_valid_table_name(&table) {
                continue;
            }

            let schema = p
                .schema_group
                .and_then(|g| caps.get(g))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();

            let key = (schema.clone(), table.clone(), p.context);
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);

            matches.push(TableMatch {
                table,
                schema,
                kind: p.kind,
                context: p.context,
            });
        }
    }

    matches
}
