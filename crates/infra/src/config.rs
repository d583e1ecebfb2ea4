//! Runtime configuration for the orchestration layer.
//!
//! Every field has a default, so an empty file (or no file at all) is a valid
//! configuration. Environment variables use the `TALLY` prefix with `__`
//! between path segments, e.g. `TALLY__RETRY__MAX_ATTEMPTS=5`.

use std::path::Path;

use serde::Deserialize;
use tally_accounting::{EntryNumbering, chart};
use tally_documents::DocumentNumbering;
use tally_observability::LogFormat;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub retry: RetryPolicy,
    pub numbering: NumberingConfig,
    pub accounts: AccountRoles,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NumberingConfig {
    pub journal: EntryNumbering,
    pub documents: DocumentNumbering,
}

/// Account codes the orchestrator posts to on its own, by role.
///
/// Receivable/payable accounts come from the partner and inventory/COGS from
/// the item, so only these four are global.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AccountRoles {
    pub sales_revenue: String,
    pub sales_tax_payable: String,
    pub input_tax: String,
    /// Credited with the value of opening stock.
    pub opening_equity: String,
}

impl Default for AccountRoles {
    fn default() -> Self {
        Self {
            sales_revenue: chart::SALES_REVENUE.to_string(),
            sales_tax_payable: chart::SALES_TAX_PAYABLE.to_string(),
            input_tax: chart::INPUT_TAX.to_string(),
            opening_equity: chart::OWNERS_EQUITY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl CoreConfig {
    /// Loads configuration from an optional file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder
            .add_source(
                config::Environment::with_prefix("TALLY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parses a TOML document; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or mistyped values.
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Installs the process-wide subscriber in the configured format.
    ///
    /// Returns `false` if one was already installed.
    pub fn init_logging(&self) -> bool {
        tally_observability::init_with(self.logging.format)
    }
}
