use clap::Args;

use crate::errors::{IngestError, IngestResult};

/// Storage settings: where raw and aggregate records live
#[derive(Args, Clone, Debug)]
pub struct StoreConfig {
    /// Postgres connection string. When absent the in-memory stores are used.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Raw event table identifier
    #[arg(long, env = "RAW_TABLE", default_value = "crypto_raw")]
    pub raw_table: String,

    /// Aggregate table identifier
    #[arg(long, env = "AGG_TABLE", default_value = "crypto_agg")]
    pub agg_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            raw_table: "crypto_raw".to_string(),
            agg_table: "crypto_agg".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> IngestResult<()> {
        validate_identifier(&self.raw_table)?;
        validate_identifier(&self.agg_table)?;

        if self.raw_table == self.agg_table {
            return Err(IngestError::invalid_config(
                "raw and aggregate tables must differ",
            ));
        }

        Ok(())
    }
}

/// Table names are spliced into SQL, so only plain identifiers are accepted
fn validate_identifier(name: &str) -> IngestResult<()> {
    let mut chars = name.chars();
    let valid_head = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_head && valid_tail && name.len() <= 63 {
        Ok(())
    } else {
        Err(IngestError::invalid_config(format!(
            "'{}' is not a valid table identifier",
            name
        )))
    }
}
