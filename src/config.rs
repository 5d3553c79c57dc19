// ⚙️ Configuration
//
// defaults < JSON file ($CLAIM_INSIGHT_CONFIG) < environment variables
//
// Binaries call dotenvy before `Config::load`, so a .env file feeds the
// environment layer.

use crate::estimator::EstimatorSettings;
use crate::snapshot::LoadParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_VAR: &str = "CLAIM_INSIGHT_CONFIG";
pub const DATA_DIR_VAR: &str = "CLAIM_INSIGHT_DATA_DIR";
pub const ADDR_VAR: &str = "CLAIM_INSIGHT_ADDR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFiles {
    pub patients: String,
    pub encounters: String,
    pub payer_transitions: String,
    pub claims: String,
    pub transactions: String,
}

impl Default for DataFiles {
    fn default() -> Self {
        DataFiles {
            patients: "patients.csv".to_string(),
            encounters: "encounters.csv".to_string(),
            payer_transitions: "payer_transitions.csv".to_string(),
            claims: "claims.csv".to_string(),
            transactions: "claims_transactions.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub files: DataFiles,
    pub server_addr: String,
    /// Rows shown in filtered claim tables
    pub preview_limit: usize,
    pub estimator: EstimatorSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            files: DataFiles::default(),
            server_addr: "127.0.0.1:3000".to_string(),
            preview_limit: 200,
            estimator: EstimatorSettings::default(),
        }
    }
}

impl Config {
    /// Resolve all three layers from the process environment
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_FILE_VAR) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Missing keys in the file keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config JSON: {:?}", path.as_ref()))
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup(ADDR_VAR).filter(|v| !v.trim().is_empty()) {
            self.server_addr = addr;
        }
    }

    pub fn load_params(&self) -> LoadParams {
        LoadParams {
            patients: self.data_dir.join(&self.files.patients),
            encounters: self.data_dir.join(&self.files.encounters),
            payer_transitions: self.data_dir.join(&self.files.payer_transitions),
            claims: self.data_dir.join(&self.files.claims),
            transactions: self.data_dir.join(&self.files.transactions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.preview_limit, 200);
        assert_eq!(config.estimator.baseline_threshold, 5.0);
        assert_eq!(config.files.transactions, "claims_transactions.csv");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "data_dir": "/srv/synthea", "estimator": {{ "baseline_threshold": 7.5 }} }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/synthea"));
        assert_eq!(config.estimator.baseline_threshold, 7.5);
        assert_eq!(config.estimator.high_cost_boundary, 2000.0);
        assert_eq!(config.preview_limit, 200);
    }

    #[test]
    fn test_bad_file_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config JSON"));
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            DATA_DIR_VAR => Some("/tmp/claims".to_string()),
            ADDR_VAR => Some("0.0.0.0:8080".to_string()),
            _ => None,
        });

        assert_eq!(config.data_dir, PathBuf::from("/tmp/claims"));
        assert_eq!(config.server_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_load_params_join_data_dir() {
        let mut config = Config::default();
        config.data_dir = PathBuf::from("/data");

        let params = config.load_params();
        assert_eq!(params.claims, PathBuf::from("/data/claims.csv"));
        assert_eq!(params.payer_transitions, PathBuf::from("/data/payer_transitions.csv"));
    }
}
