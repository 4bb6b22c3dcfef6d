//! Finding fingerprints and baseline files.
//!
//! A baseline is a set of fingerprints persisted across runs so known
//! findings can be suppressed in CI. Fingerprints cover only the
//! identity-bearing fields of a finding.

use crate::models::Finding;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Fingerprints of previously seen findings.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Baseline {
    pub fingerprints: Vec<String>,
    #[serde(skip)]
    set: HashSet<String>,
}

impl Baseline {
    /// Read a baseline file. A missing file yields an empty baseline.
    pub fn load(path: &Path) -> Result<Baseline> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Baseline::default());
            }
            Err(e) => return Err(e).with_context(|| format!("read baseline {}", path.display())),
        };

        let mut baseline: Baseline = serde_json::from_str(&data)
            .with_context(|| format!("parse baseline {}", path.display()))?;
        baseline.set = baseline.fingerprints.iter().cloned().collect();
        Ok(baseline)
    }

    /// Write the fingerprints of `findings` to a baseline file, sorted and
    /// deduplicated.
    pub fn save(path: &Path, findings: &[Finding]) -> Result<()> {
        let mut seen = HashSet::new();
        let mut fps: Vec<String> = findings
            .iter()
            .map(fingerprint)
            .filter(|fp| seen.insert(fp.clone()))
            .collect();
        fps.sort();

        let baseline = Baseline {
            fingerprints: fps,
            set: HashSet::new(),
        };
        let mut data = serde_json::to_string_pretty(&baseline)?;
        data.push('\n');
        std::fs::write(path, data).with_context(|| format!("write baseline {}", path.display()))
    }

    pub fn contains(&self, finding: &Finding) -> bool {
        self.set.contains(&fingerprint(finding))
    }

    /// Remove baselined findings, returning the survivors and the number
    /// suppressed.
    pub fn filter(&self, findings: Vec<Finding>) -> (Vec<Finding>, usize) {
        if self.set.is_empty() {
            return (findings, 0);
        }

        let mut filtered = Vec::with_capacity(findings.len());
        let mut suppressed = 0;
        for f in findings {
            if self.contains(&f) {
                suppressed += 1;
            } else {
                filtered.push(f);
            }
        }
        (filtered, suppressed)
    }
}

/// Stable identifier for a finding: sha256 of the identity fields, truncated
/// to 16 bytes and hex-encoded.
pub fn fingerprint(f: &Finding) -> String {
    let key = format!(
        "{}|{}|{}|{}|{}",
        f.kind, f.schema, f.table, f.column, f.index
    );
    let digest = Sha256::digest(key.as_bytes());
    let mut out = String::with_capacity(32);
    for b in &digest[..16] {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FindingType, Severity};
    use tempfile::tempdir;

    fn finding(table: &str) -> Finding {
        let mut f = Finding::new(FindingType::UnusedTable, Severity::High, "public", table);
        f.message = "table has no sequential or index scans".into();
        f
    }

    #[test]
    fn fingerprint_is_stable_and_identity_based() {
        let a = finding("users");
        let mut b = finding("users");
        b.severity = Severity::Low;
        b.message = "different message".into();
        b.detail.insert("k".into(), "v".into());
        // Severity, message, and detail do not participate
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_distinct_on_identity_fields() {
        let a = finding("users");
        let b = finding("orders");
        assert_ne!(fingerprint(&a), fingerprint(&b));

        let mut c = finding("users");
        c.column = "email".into();
        assert_ne!(fingerprint(&a), fingerprint(&c));

        let mut d = finding("users");
        d.index = "idx_users".into();
        assert_ne!(fingerprint(&a), fingerprint(&d));
        assert_ne!(fingerprint(&c), fingerprint(&d));
    }

    #[test]
    fn fingerprint_is_32_hex_chars() {
        let fp = fingerprint(&finding("users"));
        assert_eq!(fp.len(), 32);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn save_load_round_trip_suppresses_everything() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline.json");
        let findings = vec![finding("users"), finding("orders"), finding("users")];

        Baseline::save(&path, &findings).unwrap();
        let baseline = Baseline::load(&path).unwrap();

        // Duplicates collapse
        assert_eq!(baseline.fingerprints.len(), 2);
        let mut sorted = baseline.fingerprints.clone();
        sorted.sort();
        assert_eq!(baseline.fingerprints, sorted);

        let (remaining, suppressed) = baseline.filter(findings);
        assert!(remaining.is_empty());
        assert_eq!(suppressed, 3);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let baseline = Baseline::load(Path::new("/nonexistent/baseline.json")).unwrap();
        assert!(baseline.fingerprints.is_empty());
        let (remaining, suppressed) = baseline.filter(vec![finding("users")]);
        assert_eq!(remaining.len(), 1);
        assert_eq!(suppressed, 0);
    }

    #[test]
    fn load_malformed_file_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Baseline::load(&path).is_err());
    }

    #[test]
    fn filter_keeps_new_findings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline.json");
        Baseline::save(&path, &[finding("users")]).unwrap();

        let baseline = Baseline::load(&path).unwrap();
        let (remaining, suppressed) = baseline.filter(vec![finding("users"), finding("orders")]);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].table, "orders");
        assert_eq!(suppressed, 1);
    }
}
