use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::sync::Arc;

use crate::aggregators::config::AggregatorsConfig;
use crate::ingest::decode::{Base64Decoder, PayloadDecoder};
use crate::ingest::pipeline::IngestPipeline;
use crate::price_store::config::StoreConfig;
use crate::price_store::memory::{MemoryAggregateStore, MemoryRawEventStore};
use crate::price_store::operations::{AggregateStore, RawEventStore};
use crate::price_store::sql_queries::PgPriceStore;

/// Everything configurable, read from flags or the environment
#[derive(Parser, Clone, Debug, Default)]
pub struct Settings {
    #[command(flatten)]
    pub store: StoreConfig,

    #[command(flatten)]
    pub aggregators: AggregatorsConfig,
}

#[derive(Clone)]
pub struct AppConfig {
    pub pipeline: Arc<IngestPipeline>,
    /// False when running on the in-memory stores
    pub durable: bool,
}

impl AppConfig {
    pub fn new(pipeline: Arc<IngestPipeline>) -> Self {
        Self {
            pipeline,
            durable: false,
        }
    }

    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let settings = Settings::try_parse_from([env!("CARGO_PKG_NAME")])?;

        Self::from_settings(&settings, Arc::new(Base64Decoder))
    }

    pub fn from_settings(settings: &Settings, decoder: Arc<dyn PayloadDecoder>) -> Result<Self> {
        settings.store.validate()?;

        let (aggregates, raw, durable): (Arc<dyn AggregateStore>, Arc<dyn RawEventStore>, bool) =
            match &settings.store.database_url {
                Some(url) => {
                    let store = Arc::new(PgPriceStore::connect(url, &settings.store)?);
                    store.ensure_tables()?;
                    tracing::info!(
                        raw_table = %settings.store.raw_table,
                        agg_table = %settings.store.agg_table,
                        "postgres price store ready"
                    );
                    let aggregates: Arc<dyn AggregateStore> = store.clone();
                    let raw: Arc<dyn RawEventStore> = store;
                    (aggregates, raw, true)
                }
                None => {
                    tracing::warn!("DATABASE_URL not set, using in-memory stores (nothing survives a restart)");
                    let aggregates: Arc<dyn AggregateStore> = Arc::new(MemoryAggregateStore::new());
                    let raw: Arc<dyn RawEventStore> = Arc::new(MemoryRawEventStore::new());
                    (aggregates, raw, false)
                }
            };

        let pipeline = IngestPipeline::new(aggregates, raw, settings.aggregators.clone())?
            .with_decoder(decoder);

        Ok(Self {
            pipeline: Arc::new(pipeline),
            durable,
        })
    }

    pub fn aggregators(&self) -> &AggregatorsConfig {
        self.pipeline.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::decode::PlainDecoder;

    #[test]
    fn test_settings_without_database_fall_back_to_memory() {
        let app = AppConfig::from_settings(&Settings::default(), Arc::new(PlainDecoder)).unwrap();
        assert!(!app.durable);
        assert_eq!(app.aggregators().bucket_size_seconds, 300);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = Settings::default();
        settings.aggregators.window_minutes = 1;
        assert!(AppConfig::from_settings(&settings, Arc::new(PlainDecoder)).is_err());

        let mut settings = Settings::default();
        settings.store.raw_table = "drop table;".to_string();
        assert!(AppConfig::from_settings(&settings, Arc::new(PlainDecoder)).is_err());
    }

    #[test]
    fn test_settings_parse_from_flags() {
        let settings = Settings::try_parse_from([
            "signal",
            "--bucket-size-seconds",
            "60",
            "--window-minutes",
            "10",
            "--window-source",
            "raw",
        ])
        .unwrap();
        assert_eq!(settings.aggregators.bucket_size_seconds, 60);
        assert_eq!(settings.aggregators.window_seconds(), 600);
    }
}
