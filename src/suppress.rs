//! Suppression rules.
//!
//! Three sources combine: the `.pgspectre-ignore.yml` file (table glob plus
//! optional type), config-level finding-type ignores, and inline
//! `pgspectre:ignore` markers (handled at scan time).

use crate::models::Finding;
use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::path::Path;

pub const IGNORE_FILE: &str = ".pgspectre-ignore.yml";
const INLINE_MARKER: &str = "pgspectre:ignore";

/// A single rule in the ignore file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Suppression {
    pub table: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IgnoreFile {
    #[serde(default)]
    suppressions: Vec<Suppression>,
}

/// Loaded suppression rules from all sources.
#[derive(Debug, Default)]
pub struct Rules {
    suppressions: Vec<Suppression>,
    config_findings: Vec<String>,
}

impl Rules {
    /// Load `.pgspectre-ignore.yml` from the given directory. A missing file
    /// yields empty rules.
    pub fn load(dir: &Path) -> Result<Rules> {
        let path = dir.join(IGNORE_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Rules::default()),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };

        let file: IgnoreFile = serde_yaml::from_str(&data)
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(Rules {
            suppressions: file.suppressions,
            config_findings: Vec::new(),
        })
    }

    /// Add finding-type suppressions from the config's `exclude.findings`.
    pub fn with_config_findings(mut self, findings: &[String]) -> Rules {
        self.config_findings = findings.to_vec();
        self
    }

    pub fn is_suppressed(&self, f: &Finding) -> bool {
        if self
            .config_findings
            .iter()
            .any(|ft| ft.eq_ignore_ascii_case(f.kind.as_str()))
        {
            return true;
        }

        self.suppressions.iter().any(|s| {
            match_table(&s.table, &f.table)
                && s.kind
                    .as_deref()
                    .map(|t| t.eq_ignore_ascii_case(f.kind.as_str()))
                    .unwrap_or(true)
        })
    }

    /// Remove suppressed findings, returning the survivors and the number
    /// suppressed.
    pub fn filter(&self, findings: Vec<Finding>) -> (Vec<Finding>, usize) {
        if self.suppressions.is_empty() && self.config_findings.is_empty() {
            return (findings, 0);
        }

        let mut filtered = Vec::with_capacity(findings.len());
        let mut suppressed = 0;
        for f in findings {
            if self.is_suppressed(&f) {
                suppressed += 1;
            } else {
                filtered.push(f);
            }
        }
        (filtered, suppressed)
    }
}

/// Match a table name against a pattern supporting a trailing `*` wildcard,
/// case-insensitive.
fn match_table(pattern: &str, table: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let table = table.to_lowercase();

    match pattern.strip_suffix('*') {
        Some(prefix) => table.starts_with(prefix),
        None => pattern == table,
    }
}

/// True when the line carries an inline ignore marker.
pub fn has_inline_ignore(line: &str) -> bool {
    line.contains(INLINE_MARKER)
}
