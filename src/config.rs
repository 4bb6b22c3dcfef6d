//! Configuration file handling.
//!
//! `.pgspectre.yml` is searched in the working directory, then the user's
//! home directory. Missing files fall back to built-in defaults; malformed
//! files are fatal.

use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = ".pgspectre.yml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub db_url: String,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub exclude: Exclude,
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(default)]
    pub defaults: Defaults,
}

/// Detection sensitivity knobs. Zero means "use default".
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Thresholds {
    #[serde(default)]
    pub vacuum_days: i64,
    #[serde(default)]
    pub unused_index_min_bytes: i64,
    #[serde(default)]
    pub bloat_min_bytes: i64,
}

/// Tables, schemas, and finding types to skip during analysis.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Exclude {
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(default)]
    pub findings: Vec<String>,
}

/// Default CLI flag values.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Defaults {
    #[serde(default)]
    pub format: String,
    /// Catalog deadline, e.g. "30s" or "5m".
    #[serde(default)]
    pub timeout: String,
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

impl Config {
    /// Read configuration from `.pgspectre.yml` in `dir`, falling back to the
    /// home directory, then to built-in defaults.
    pub fn load(dir: &Path) -> Result<Config> {
        let mut paths = vec![dir.join(CONFIG_FILE)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_FILE));
        }

        for path in paths {
            let data = match std::fs::read_to_string(&path) {
                Ok(data) => data,
                Err(_) => continue,
            };
            return serde_yaml::from_str(&data)
                .with_context(|| format!("parse config {}", path.display()));
        }

        Ok(Config::default())
    }

    /// True when a config file exists in `dir`.
    pub fn exists(dir: &Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    /// The catalog deadline from `defaults.timeout`, 30s when unset or
    /// unparseable.
    pub fn timeout(&self) -> Duration {
        parse_duration(&self.defaults.timeout).unwrap_or(DEFAULT_TIMEOUT)
    }
}

/// Parse durations of the form "30s", "5m", "1h", or a bare seconds count.
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (value, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s, "s"),
    };
    let value: u64 = value.parse().ok()?;

    match unit.trim() {
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        "ms" => Some(Duration::from_millis(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_when_no_file() {
        let dir = tempdir().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert!(cfg.db_url.is_empty());
        assert_eq!(cfg.thresholds.vacuum_days, 0);
        assert_eq!(cfg.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn loads_full_config() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
db_url: postgres://localhost/app
thresholds:
  vacuum_days: 14
  unused_index_min_bytes: 52428800
  bloat_min_bytes: 2097152
exclude:
  tables:
    - schema_migrations
  schemas:
    - audit
  findings:
    - MISSING_VACUUM
schemas:
  - public
defaults:
  format: json
  timeout: 45s
"#,
        )
        .unwrap();

        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.db_url, "postgres://localhost/app");
        assert_eq!(cfg.thresholds.vacuum_days, 14);
        assert_eq!(cfg.thresholds.unused_index_min_bytes, 52428800);
        assert_eq!(cfg.thresholds.bloat_min_bytes, 2097152);
        assert_eq!(cfg.exclude.tables, vec!["schema_migrations"]);
        assert_eq!(cfg.exclude.schemas, vec!["audit"]);
        assert_eq!(cfg.exclude.findings, vec!["MISSING_VACUUM"]);
        assert_eq!(cfg.schemas, vec!["public"]);
        assert_eq!(cfg.defaults.format, "json");
        assert_eq!(cfg.timeout(), Duration::from_secs(45));
    }

    #[test]
    fn malformed_config_errors() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "thresholds: [not a map]").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn unknown_keys_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "no_such_key: true").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("45"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("fast"), None);
    }
}
