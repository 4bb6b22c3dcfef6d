//! Report filter stages shared by the audit and check commands.

use crate::models::{Finding, Severity};

/// Legacy names accepted for finding types.
fn canonical_finding_type(t: &str) -> String {
    let t = t.trim().to_uppercase();
    match t.as_str() {
        "SCHEMA_DRIFT" => "MISSING_COLUMN".to_string(),
        _ => t,
    }
}

/// Apply `--min-severity` and `--type` filters.
pub fn apply_report_filters(
    findings: Vec<Finding>,
    min_severity: Option<&str>,
    type_filter: Option<&str>,
) -> Vec<Finding> {
    let mut findings = findings;
    if let Some(min) = min_severity {
        findings = filter_by_severity(findings, min);
    }
    if let Some(types) = type_filter {
        findings = filter_by_type(findings, types);
    }
    findings
}

/// Keep findings at or above the given severity. An unknown severity name
/// means no filtering.
fn filter_by_severity(findings: Vec<Finding>, min: &str) -> Vec<Finding> {
    let Some(threshold) = Severity::parse(min) else {
        return findings;
    };
    findings
        .into_iter()
        .filter(|f| f.severity >= threshold)
        .collect()
}

/// Keep findings matching the comma-separated type whitelist.
fn filter_by_type(findings: Vec<Finding>, type_filter: &str) -> Vec<Finding> {
    let types: Vec<String> = type_filter
        .split(',')
        .map(canonical_finding_type)
        .filter(|t| !t.is_empty())
        .collect();
    if types.is_empty() {
        return findings;
    }
    findings
        .into_iter()
        .filter(|f| types.iter().any(|t| t == f.kind.as_str()))
        .collect()
}

/// True when any finding matches the `--fail-on` criteria: a comma-separated
/// mix of finding types and severity names.
pub fn should_fail_on(findings: &[Finding], fail_on: &str) -> bool {
    let mut types = Vec::new();
    let mut severities = Vec::new();

    for part in fail_on.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match Severity::parse(part) {
            Some(sev) => severities.push(sev),
            None => types.push(canonical_finding_type(part)),
        }
    }

    findings.iter().any(|f| {
        types.iter().any(|t| t == f.kind.as_str()) || severities.contains(&f.severity)
    })
}

/// Resolve the check command's legacy fail aliases when `--fail-on` is not
/// explicitly set.
pub fn resolve_check_fail_on(
    fail_on: Option<&str>,
    fail_on_missing: bool,
    fail_on_drift: bool,
) -> Option<String> {
    if let Some(f) = fail_on {
        if !f.trim().is_empty() {
            return Some(f.to_string());
        }
    }
    let mut parts = Vec::new();
    if fail_on_missing {
        parts.push("MISSING_TABLE");
    }
    if fail_on_drift {
        parts.push("MISSING_COLUMN");
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FindingType;

    fn finding(kind: FindingType, severity: Severity) -> Finding {
        Finding::new(kind, severity, "public", "t")
    }

    fn sample() -> Vec<Finding> {
        vec![
            finding(FindingType::MissingTable, Severity::High),
            finding(FindingType::MissingColumn, Severity::Medium),
            finding(FindingType::BloatedIndex, Severity::Low),
            finding(FindingType::CodeMatch, Severity::Info),
        ]
    }

    #[test]
    fn min_severity_keeps_at_or_above() {
        let out = apply_report_filters(sample(), Some("medium"), None);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|f| f.severity >= Severity::Medium));
    }

    #[test]
    fn min_severity_unknown_is_no_filter() {
        let out = apply_report_filters(sample(), Some("catastrophic"), None);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn type_filter_whitelist() {
        let out = apply_report_filters(sample(), None, Some("MISSING_TABLE,BLOATED_INDEX"));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn type_filter_case_insensitive_with_alias() {
        let out = apply_report_filters(sample(), None, Some("schema_drift"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, FindingType::MissingColumn);
    }

    #[test]
    fn both_filters_compose() {
        let out = apply_report_filters(
            sample(),
            Some("medium"),
            Some("MISSING_TABLE,MISSING_COLUMN"),
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn fail_on_type() {
        let findings = vec![finding(FindingType::MissingColumn, Severity::Medium)];
        assert!(should_fail_on(&findings, "MISSING_COLUMN"));
        assert!(!should_fail_on(&findings, "MISSING_TABLE"));
    }

    #[test]
    fn fail_on_severity() {
        let findings = vec![finding(FindingType::BloatedIndex, Severity::Low)];
        assert!(should_fail_on(&findings, "low"));
        assert!(!should_fail_on(&findings, "high"));
    }

    #[test]
    fn fail_on_mixed_list() {
        let findings = vec![finding(FindingType::UnusedIndex, Severity::Medium)];
        assert!(should_fail_on(&findings, "MISSING_TABLE, medium"));
    }

    #[test]
    fn fail_on_alias() {
        let findings = vec![finding(FindingType::MissingColumn, Severity::Medium)];
        assert!(should_fail_on(&findings, "SCHEMA_DRIFT"));
    }

    #[test]
    fn fail_on_empty_never_matches() {
        assert!(!should_fail_on(&sample(), ""));
        assert!(!should_fail_on(&sample(), " , "));
    }

    #[test]
    fn check_fail_on_aliases() {
        assert_eq!(
            resolve_check_fail_on(None, true, false).as_deref(),
            Some("MISSING_TABLE")
        );
        assert_eq!(
            resolve_check_fail_on(None, false, true).as_deref(),
            Some("MISSING_COLUMN")
        );
        assert_eq!(
            resolve_check_fail_on(None, true, true).as_deref(),
            Some("MISSING_TABLE,MISSING_COLUMN")
        );
        assert_eq!(resolve_check_fail_on(None, false, false), None);
        // Explicit --fail-on wins over aliases
        assert_eq!(
            resolve_check_fail_on(Some("high"), true, true).as_deref(),
            Some("high")
        );
    }
}
