use bigdecimal::BigDecimal;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::{IngestError, IngestResult};

/// Where the window statistic is read from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WindowSource {
    /// Bucket aggregates, falling back to raw events when no bucket exists in range
    Auto,
    /// Bucket aggregates only
    Buckets,
    /// Raw events only (reports min/max)
    Raw,
}

/// Configuration for bucketing, windowing and signal classification
#[derive(Args, Clone, Debug)]
pub struct AggregatorsConfig {
    /// Width of one aggregation bucket
    #[arg(long, env = "BUCKET_SIZE_SECONDS", default_value_t = 300)]
    pub bucket_size_seconds: i64,

    /// Trailing window used for the moving average
    #[arg(long, env = "WINDOW_MINUTES", default_value_t = 30)]
    pub window_minutes: i64,

    /// Percentage deviation from the average that flips the signal
    #[arg(long, env = "SIGNAL_THRESHOLD_PCT", default_value = "2.0", value_parser = parse_threshold)]
    pub signal_threshold_pct: BigDecimal,

    #[arg(long, env = "WINDOW_SOURCE", value_enum, default_value_t = WindowSource::Auto)]
    pub window_source: WindowSource,

    /// Events older than this (relative to the clock) are skipped
    #[arg(long, env = "MAX_EVENT_AGE_SECS")]
    pub max_event_age_secs: Option<i64>,

    /// Process distinct assets of a batch concurrently
    #[arg(long, env = "PARALLEL_ASSETS", default_value_t = false)]
    pub parallel_assets: bool,
}

impl Default for AggregatorsConfig {
    fn default() -> Self {
        Self {
            bucket_size_seconds: 300, // 5 min buckets
            window_minutes: 30,
            signal_threshold_pct: BigDecimal::from(2),
            window_source: WindowSource::Auto,
            max_event_age_secs: None,
            parallel_assets: false,
        }
    }
}

fn parse_threshold(value: &str) -> Result<BigDecimal, String> {
    BigDecimal::from_str(value.trim()).map_err(|e| format!("'{}' is not a number: {}", value, e))
}

impl AggregatorsConfig {
    pub fn window_seconds(&self) -> i64 {
        self.window_minutes.saturating_mul(60)
    }

    /// Checks `window >= bucket_size > 0` and a strictly positive threshold.
    pub fn validate(&self) -> IngestResult<()> {
        if self.bucket_size_seconds <= 0 {
            return Err(IngestError::invalid_config(format!(
                "bucket_size_seconds must be positive, got {}",
                self.bucket_size_seconds
            )));
        }

        if self.window_minutes.checked_mul(60).is_none() {
            return Err(IngestError::invalid_config(format!(
                "window_minutes {} does not fit in seconds",
                self.window_minutes
            )));
        }

        if self.window_seconds() < self.bucket_size_seconds {
            return Err(IngestError::invalid_config(format!(
                "window ({}s) must be at least one bucket ({}s)",
                self.window_seconds(),
                self.bucket_size_seconds
            )));
        }

        if self.signal_threshold_pct <= BigDecimal::from(0) {
            return Err(IngestError::invalid_config(
                "signal_threshold_pct must be strictly positive",
            ));
        }

        if let Some(age) = self.max_event_age_secs {
            if age <= 0 {
                return Err(IngestError::invalid_config(
                    "max_event_age_secs must be positive when set",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: AggregatorsConfig,
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AggregatorsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_seconds(), 1800);
        assert_eq!(config.signal_threshold_pct, BigDecimal::from(2));
    }

    #[test]
    fn test_window_smaller_than_bucket_rejected() {
        let config = AggregatorsConfig {
            bucket_size_seconds: 3600,
            window_minutes: 30,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(IngestError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_bucket_rejected() {
        let config = AggregatorsConfig {
            bucket_size_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_must_be_positive() {
        let zero = AggregatorsConfig {
            signal_threshold_pct: BigDecimal::from(0),
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_threshold_parsed_once_from_flag() {
        let parsed = TestCli::try_parse_from(["test", "--signal-threshold-pct", " 1.5 "]).unwrap();
        assert_eq!(parsed.config.signal_threshold_pct, BigDecimal::from_str("1.5").unwrap());

        assert!(TestCli::try_parse_from(["test", "--signal-threshold-pct", "two"]).is_err());
    }

    #[test]
    fn test_window_minutes_overflow_rejected() {
        let config = AggregatorsConfig {
            window_minutes: i64::MAX / 10,
            ..Default::default()
        };
        assert_eq!(config.window_seconds(), i64::MAX);
        assert!(matches!(config.validate(), Err(IngestError::InvalidConfig(_))));
    }
}
