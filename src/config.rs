//! Output modes and the optional YAML configuration file.
//!
//! Command-line flags override anything loaded from YAML.

use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Schema, data and deferred constraints in one SQL script (default)
    #[default]
    Full,
    /// Schema only, every foreign key added after the tables
    Schema,
    /// One CSV file per table, no SQL
    Rows,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Mode::Full),
            "schema" | "schema-only" => Ok(Mode::Schema),
            "rows" | "csv" => Ok(Mode::Rows),
            _ => Err(format!(
                "Unknown mode: {}. Valid options: full, schema, rows",
                s
            )),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Full => write!(f, "full"),
            Mode::Schema => write!(f, "schema"),
            Mode::Rows => write!(f, "rows"),
        }
    }
}

/// Settings read from `--config <file.yaml>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateYamlConfig {
    pub mode: Option<Mode>,
    /// Tables created first, in this order
    pub pin: Vec<String>,
    /// Emit DROP TABLE IF EXISTS before the CREATE statements
    pub drop_tables: Option<bool>,
    /// Copy leading comments of the dump into the output
    pub keep_comments: Option<bool>,
    pub diagnostics_limit: Option<usize>,
}

impl TranslateYamlConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: TranslateYamlConfig = serde_yaml_ng::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("full".parse::<Mode>().unwrap(), Mode::Full);
        assert_eq!("SCHEMA".parse::<Mode>().unwrap(), Mode::Schema);
        assert_eq!("csv".parse::<Mode>().unwrap(), Mode::Rows);
        assert!("bogus".parse::<Mode>().is_err());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
mode: schema
pin:
  - users
  - accounts
drop_tables: true
"#;
        let config: TranslateYamlConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.mode, Some(Mode::Schema));
        assert_eq!(config.pin, vec!["users", "accounts"]);
        assert_eq!(config.drop_tables, Some(true));
        assert_eq!(config.keep_comments, None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translate.yaml");
        fs::write(&path, "mode: rows\ndiagnostics_limit: 5\n").unwrap();
        let config = TranslateYamlConfig::load(&path).unwrap();
        assert_eq!(config.mode, Some(Mode::Rows));
        assert_eq!(config.diagnostics_limit, Some(5));
    }

    #[test]
    fn test_load_rejects_bad_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "mode: [unclosed").unwrap();
        assert!(TranslateYamlConfig::load(&path).is_err());
    }
}
