//! Core data models shared by the detectors, filters, and reporters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Risk level of a finding. Variant order defines the severity ordering used
/// by `--min-severity` and exit-code mapping: info < low < medium < high.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl Severity {
    /// Parse a severity name, case-insensitive. Unknown names yield None.
    pub fn parse(s: &str) -> Option<Severity> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Some(Severity::Info),
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

/// What kind of issue a finding reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FindingType {
    #[serde(rename = "UNUSED_TABLE")]
    UnusedTable,
    #[serde(rename = "UNUSED_INDEX")]
    UnusedIndex,
    #[serde(rename = "BLOATED_INDEX")]
    BloatedIndex,
    #[serde(rename = "MISSING_VACUUM")]
    MissingVacuum,
    #[serde(rename = "NO_PRIMARY_KEY")]
    NoPrimaryKey,
    #[serde(rename = "DUPLICATE_INDEX")]
    DuplicateIndex,
    #[serde(rename = "MISSING_TABLE")]
    MissingTable,
    #[serde(rename = "MISSING_COLUMN")]
    MissingColumn,
    #[serde(rename = "UNREFERENCED_TABLE")]
    UnreferencedTable,
    #[serde(rename = "CODE_MATCH")]
    CodeMatch,
    #[serde(rename = "UNINDEXED_QUERY")]
    UnindexedQuery,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingType::UnusedTable => "UNUSED_TABLE",
            FindingType::UnusedIndex => "UNUSED_INDEX",
            FindingType::BloatedIndex => "BLOATED_INDEX",
            FindingType::MissingVacuum => "MISSING_VACUUM",
            FindingType::NoPrimaryKey => "NO_PRIMARY_KEY",
            FindingType::DuplicateIndex => "DUPLICATE_INDEX",
            FindingType::MissingTable => "MISSING_TABLE",
            FindingType::MissingColumn => "MISSING_COLUMN",
            FindingType::UnreferencedTable => "UNREFERENCED_TABLE",
            FindingType::CodeMatch => "CODE_MATCH",
            FindingType::UnindexedQuery => "UNINDEXED_QUERY",
        }
    }
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit or check result.
///
/// `(type, schema, table, column, index)` is the finding's identity; severity,
/// message, and detail do not participate in fingerprinting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingType,
    pub severity: Severity,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub table: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub column: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub index: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detail: BTreeMap<String, String>,
}

impl Finding {
    pub fn new(kind: FindingType, severity: Severity, schema: &str, table: &str) -> Self {
        Finding {
            kind,
            severity,
            schema: schema.to_string(),
            table: table.to_string(),
            column: String::new(),
            index: String::new(),
            message: String::new(),
            detail: BTreeMap::new(),
        }
    }
}

/// Highest severity among findings, `Info` if none.
pub fn max_severity(findings: &[Finding]) -> Severity {
    findings
        .iter()
        .map(|f| f.severity)
        .max()
        .unwrap_or(Severity::Info)
}

/// Map the report's max severity to a CLI exit code.
pub fn exit_code(severity: Severity) -> i32 {
    match severity {
        Severity::High => 2,
        Severity::Medium => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }

    #[test]
    fn severity_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
        let s: Severity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(s, Severity::Medium);
    }

    #[test]
    fn finding_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&FindingType::MissingTable).unwrap(),
            "\"MISSING_TABLE\""
        );
        assert_eq!(FindingType::UnindexedQuery.as_str(), "UNINDEXED_QUERY");
    }

    #[test]
    fn max_severity_empty_is_info() {
        assert_eq!(max_severity(&[]), Severity::Info);
    }

    #[test]
    fn max_severity_picks_highest() {
        let findings = vec![
            Finding::new(FindingType::BloatedIndex, Severity::Low, "public", "a"),
            Finding::new(FindingType::MissingColumn, Severity::Medium, "public", "b"),
        ];
        assert_eq!(max_severity(&findings), Severity::Medium);
    }

    #[test]
    fn exit_code_mapping() {
        assert_eq!(exit_code(Severity::High), 2);
        assert_eq!(exit_code(Severity::Medium), 1);
        assert_eq!(exit_code(Severity::Low), 0);
        assert_eq!(exit_code(Severity::Info), 0);
    }
}
