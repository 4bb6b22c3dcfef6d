//! SARIF 2.1.0 reporter — minimal subset for valid output.

use super::Report;
use crate::models::{FindingType, Severity};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json";

#[derive(Serialize)]
struct SarifLog {
    version: String,
    #[serde(rename = "$schema")]
    schema: String,
    runs: Vec<SarifRun>,
}

#[derive(Serialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifDriver {
    name: String,
    version: String,
    information_uri: String,
    rules: Vec<SarifRule>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifRule {
    id: String,
    short_description: SarifMessage,
    default_configuration: SarifRuleDefaults,
}

#[derive(Serialize)]
struct SarifRuleDefaults {
    level: String,
}

#[derive(Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifResult {
    rule_id: String,
    level: String,
    message: SarifMessage,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    locations: Vec<SarifLocation>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifLocation {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    logical_locations: Vec<SarifLogicalLocation>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifLogicalLocation {
    name: String,
    fully_qualified_name: String,
    kind: String,
}

fn rule_description(kind: FindingType) -> &'static str {
    match kind {
        FindingType::MissingTable => "Table referenced in code does not exist in database",
        FindingType::MissingColumn => "Column referenced in code does not exist in table",
        FindingType::UnusedTable => "Table has no read activity (seq_scan=0, idx_scan=0)",
        FindingType::UnreferencedTable => "Table exists in database but not referenced in code",
        FindingType::UnusedIndex => "Index has never been used for scans",
        FindingType::BloatedIndex => "Index size exceeds table size",
        FindingType::MissingVacuum => "Table has not been vacuumed recently",
        FindingType::NoPrimaryKey => "Table has no primary key constraint",
        FindingType::DuplicateIndex => "Multiple indexes with same definition on same table",
        FindingType::CodeMatch => "Table reference in code matches database table",
        FindingType::UnindexedQuery => "Column used in WHERE/ORDER BY has no supporting index",
    }
}

fn severity_to_level(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low | Severity::Info => "note",
    }
}

pub(super) fn write_sarif(w: &mut dyn Write, report: &Report) -> Result<()> {
    // One rule per finding type present in the report
    let rule_set: BTreeSet<FindingType> = report.findings.iter().map(|f| f.kind).collect();

    let rules: Vec<SarifRule> = rule_set
        .into_iter()
        .map(|kind| SarifRule {
            id: format!("pgspectre/{kind}"),
            short_description: SarifMessage {
                text: rule_description(kind).to_string(),
            },
            default_configuration: SarifRuleDefaults {
                level: "warning".to_string(),
            },
        })
        .collect();

    let results: Vec<SarifResult> = report
        .findings
        .iter()
        .map(|f| {
            let mut fqn = format!("{}.{}", f.schema, f.table);
            if !f.column.is_empty() {
                fqn.push_str(&format!(".{}", f.column));
            } else if !f.index.is_empty() {
                fqn.push_str(&format!(".{}", f.index));
            }

            let mut text = f.message.clone();
            for (k, v) in &f.detail {
                text.push_str(&format!(" [{k}={v}]"));
            }

            SarifResult {
                rule_id: format!("pgspectre/{}", f.kind),
                level: severity_to_level(f.severity).to_string(),
                message: SarifMessage { text },
                locations: vec![SarifLocation {
                    logical_locations: vec![SarifLogicalLocation {
                        name: f.table.clone(),
                        fully_qualified_name: fqn,
                        kind: "database/table".to_string(),
                    }],
                }],
            }
        })
        .collect();

    let log = SarifLog {
        version: SARIF_VERSION.to_string(),
        schema: SARIF_SCHEMA.to_string(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: "pgspectre".to_string(),
                    version: report.metadata.version.clone(),
                    information_uri: "https://github.com/pgspectre/pgspectre".to_string(),
                    rules,
                },
            },
            results,
        }],
    };

    serde_json::to_writer_pretty(&mut *w, &log)?;
    writeln!(w)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Finding;

    fn render(report: &Report) -> serde_json::Value {
        let mut out = Vec::new();
        write_sarif(&mut out, report).unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    fn finding(kind: FindingType, severity: Severity, table: &str) -> Finding {
        let mut f = Finding::new(kind, severity, "public", table);
        f.message = format!("{kind} on {table}");
        f
    }

    #[test]
    fn sarif_basic_shape() {
        let report = Report::new(
            "audit",
            vec![
                finding(FindingType::MissingTable, Severity::High, "ghost"),
                finding(FindingType::NoPrimaryKey, Severity::Medium, "logs"),
            ],
            "0.1.0",
        );
        let v = render(&report);

        assert_eq!(v["version"], "2.1.0");
        assert_eq!(v["runs"][0]["tool"]["driver"]["name"], "pgspectre");
        assert_eq!(v["runs"][0]["results"].as_array().unwrap().len(), 2);
        assert_eq!(v["runs"][0]["tool"]["driver"]["rules"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn severity_level_mapping() {
        assert_eq!(severity_to_level(Severity::High), "error");
        assert_eq!(severity_to_level(Severity::Medium), "warning");
        assert_eq!(severity_to_level(Severity::Low), "note");
        assert_eq!(severity_to_level(Severity::Info), "note");
    }

    #[test]
    fn rule_per_type_not_per_finding() {
        let report = Report::new(
            "audit",
            vec![
                finding(FindingType::UnusedTable, Severity::High, "a"),
                finding(FindingType::UnusedTable, Severity::High, "b"),
            ],
            "0.1.0",
        );
        let v = render(&report);
        let rules = v["runs"][0]["tool"]["driver"]["rules"].as_array().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0]["id"], "pgspectre/UNUSED_TABLE");
    }

    #[test]
    fn fully_qualified_name_prefers_column() {
        let mut f = finding(FindingType::MissingColumn, Severity::Medium, "users");
        f.column = "email".into();
        f.index = "never_shown".into();
        let report = Report::new("check", vec![f], "0.1.0");
        let v = render(&report);
        assert_eq!(
            v["runs"][0]["results"][0]["locations"][0]["logicalLocations"][0]
                ["fullyQualifiedName"],
            "public.users.email"
        );
    }

    #[test]
    fn detail_appended_to_message() {
        let mut f = finding(FindingType::UnusedIndex, Severity::Medium, "users");
        f.detail.insert("size".into(), "8.0 KB".into());
        let report = Report::new("audit", vec![f], "0.1.0");
        let v = render(&report);
        let msg = v["runs"][0]["results"][0]["message"]["text"].as_str().unwrap();
        assert!(msg.contains("[size=8.0 KB]"));
    }

    #[test]
    fn empty_findings_valid_sarif() {
        let report = Report::new("audit", vec![], "0.1.0");
        let v = render(&report);
        assert_eq!(v["runs"][0]["results"].as_array().unwrap().len(), 0);
    }
}
