// ⚙️ Ledger configuration
//
// Defaults, then an optional JSON file, then environment overrides:
//   BANK_LEDGER_DB         database path
//   BANK_LEDGER_NUMBERING  "sequential" | "random"
//   BANK_LEDGER_ADDR       server listen address

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::entities::AccountNumber;
use crate::numbering::{AccountNumberGenerator, NumberingStrategy};

pub const ENV_DB: &str = "BANK_LEDGER_DB";
pub const ENV_NUMBERING: &str = "BANK_LEDGER_NUMBERING";
pub const ENV_ADDR: &str = "BANK_LEDGER_ADDR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub numbering: NumberingStrategy,

    /// First number handed out in an empty bank (sequential numbering)
    #[serde(default = "default_first_account_number")]
    pub first_account_number: AccountNumber,

    /// Candidates tried before account creation fails
    #[serde(default = "default_max_allocation_attempts")]
    pub max_allocation_attempts: u32,

    /// Listen address for bank-server
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("bank_ledger.db")
}

fn default_first_account_number() -> AccountNumber {
    1000
}

fn default_max_allocation_attempts() -> u32 {
    32
}

fn default_server_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            database_path: default_database_path(),
            numbering: NumberingStrategy::default(),
            first_account_number: default_first_account_number(),
            max_allocation_attempts: default_max_allocation_attempts(),
            server_addr: default_server_addr(),
        }
    }
}

impl LedgerConfig {
    /// Parse a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// File (if given) plus process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production)
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DB) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(numbering) = lookup(ENV_NUMBERING) {
            self.numbering = numbering
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid {}", ENV_NUMBERING))?;
        }
        if let Some(addr) = lookup(ENV_ADDR) {
            self.server_addr = addr;
        }
        Ok(self)
    }

    pub fn number_generator(&self) -> AccountNumberGenerator {
        AccountNumberGenerator::new(
            self.numbering,
            self.first_account_number,
            self.max_allocation_attempts,
        )
    }
}
