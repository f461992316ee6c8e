use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tally_core::NumberFormat;
use tally_import::{ExtractionDefaults, MODEL_FILE_NAME};
use tally_reports::LedgerConfig;
use tally_storage::RULES_DB_FILE_NAME;

pub const CONFIG_ENV: &str = "TALLY_CONFIG";
pub const CONFIG_FILE_NAME: &str = "tally.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub ledger: LedgerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSettings {
    #[serde(default = "default_bin_path")]
    pub bin_path: String,
    pub file_path: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub commodity: CommoditySettings,
    #[serde(default)]
    pub number_format: NumberFormat,
    #[serde(default)]
    pub accounts: AccountSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommoditySettings {
    pub default: String,
}

impl Default for CommoditySettings {
    fn default() -> Self {
        Self {
            default: "INR".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    pub to_default: String,
    pub from_default: String,
    pub payee_default: String,
    /// Placeholder account whose postings the classifier may re-target.
    pub uncategorized: String,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            to_default: "Expenses:Other".to_string(),
            from_default: "Assets:Checking".to_string(),
            payee_default: "Unknown".to_string(),
            uncategorized: "Expenses:Other".to_string(),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "tally", "tally")
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".tally"))
}

fn default_bin_path() -> String {
    "ledger".to_string()
}

fn default_timeout_secs() -> u64 {
    60 * 60
}

impl Config {
    /// Loads from `explicit`, else `$TALLY_CONFIG`, else the platform config directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(|| project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME)))
            .context("no configuration file given and no config directory available")?;

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;

        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            bin_path: self.ledger.bin_path.clone(),
            file_path: self.ledger.file_path.clone(),
            default_commodity: self.ledger.commodity.default.clone(),
            number_format: self.ledger.number_format,
        }
    }

    pub fn extraction_defaults(&self) -> ExtractionDefaults {
        let accounts = &self.ledger.accounts;
        ExtractionDefaults {
            account_to: accounts.to_default.clone(),
            account_from: accounts.from_default.clone(),
            payee: accounts.payee_default.clone(),
            commodity: self.ledger.commodity.default.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.ledger.timeout_secs)
    }

    pub fn rules_db_path(&self) -> PathBuf {
        self.data_dir.join(RULES_DB_FILE_NAME)
    }

    pub fn model_path(&self) -> PathBuf {
        self.data_dir.join(MODEL_FILE_NAME)
    }
}
