use std::sync::Arc;

use crate::aggregators::config::AggregatorsConfig;
use crate::aggregators::processor::WindowAggregator;
use crate::aggregators::signal::{classify, Signal};
use crate::aggregators::time_series;
use crate::errors::IngestResult;
use crate::ingest::pipeline::IngestPipeline;
use crate::ingest::processor_enums::*;
use crate::price_store::operations::{AggregateStore, RawEventStore};
use crate::utils::app_config::AppConfig;
use crate::utils::traits::ActionProcessor;

impl ActionProcessor<AggregatorsConfig, IngestProcessorOutput> for IngestProcessorInput {
    async fn process(&self, app_config: &mut AppConfig, local_config: &mut AggregatorsConfig) -> anyhow::Result<IngestProcessorOutput> {
        let pipeline = app_config.pipeline.clone();
        let config = local_config.clone();
        let input = self.clone();

        // stores are synchronous (diesel), keep them off the async workers
        let output = tokio::task::spawn_blocking(move || input.run(&pipeline, &config)).await??;

        Ok(output)
    }
}

impl IngestProcessorInput {
    fn run(&self, pipeline: &Arc<IngestPipeline>, config: &AggregatorsConfig) -> IngestResult<IngestProcessorOutput> {
        match self {
            IngestProcessorInput::ProcessBatch(body) => {
                let report = pipeline.process_envelope(body)?;
                Ok(IngestProcessorOutput::ProcessBatch(report))
            }
            IngestProcessorInput::ProcessPayloads(payloads) => {
                Ok(IngestProcessorOutput::ProcessPayloads(pipeline.process_batch(payloads)))
            }
            IngestProcessorInput::GetAggregates(args) => {
                let from = time_series::align(args.from, config.bucket_size_seconds);
                let buckets = pipeline.aggregates().query_range(&args.asset_id, from, args.to)?;
                Ok(IngestProcessorOutput::GetAggregates(buckets))
            }
            IngestProcessorInput::GetRawEvents(args) => {
                let records = pipeline.raw_events().query_range(&args.asset_id, args.from, args.to)?;
                Ok(IngestProcessorOutput::GetRawEvents(records))
            }
            IngestProcessorInput::GetWindow(args) => {
                let now = args.now.unwrap_or_else(|| pipeline.now());
                let bucket_size = config.bucket_size_seconds;
                let window = config.window_seconds();

                let aggregator = WindowAggregator::new(
                    pipeline.aggregates(),
                    pipeline.raw_events(),
                    config.window_source,
                );
                let stat = aggregator.compute(&args.asset_id, now, window, bucket_size)?;

                let current_price = pipeline
                    .raw_events()
                    .latest(&args.asset_id, now)?
                    .map(|record| record.price_usd);

                let (signal, pct_change) = match &current_price {
                    Some(price) => {
                        let c = classify(price, stat.avg.as_ref(), &config.signal_threshold_pct);
                        (c.signal, c.pct_change)
                    }
                    None => (Signal::Neutral, None),
                };

                let (window_start, last_bucket) = time_series::window_bounds(now, window, bucket_size);

                Ok(IngestProcessorOutput::GetWindow(WindowSnapshot {
                    asset_id: args.asset_id.clone(),
                    now,
                    window_start,
                    window_end: time_series::bucket_end(last_bucket, bucket_size),
                    current_price,
                    stat,
                    signal,
                    pct_change,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::clock::FixedClock;
    use crate::ingest::decode::{EncodedPayload, PlainDecoder};
    use crate::price_store::memory::{MemoryAggregateStore, MemoryRawEventStore};
    use bigdecimal::BigDecimal;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn app_config() -> AppConfig {
        let pipeline = IngestPipeline::new(
            Arc::new(MemoryAggregateStore::new()),
            Arc::new(MemoryRawEventStore::new()),
            AggregatorsConfig::default(),
        )
        .unwrap()
        .with_decoder(Arc::new(PlainDecoder))
        .with_clock(Arc::new(FixedClock(NOW)));
        AppConfig::new(Arc::new(pipeline))
    }

    fn line(asset: &str, price: i64, ts: i64) -> EncodedPayload {
        EncodedPayload::new(json!({asset: {"usd": price, "observed_at": ts}}).to_string())
    }

    async fn run(app: &AppConfig, input: IngestProcessorInput) -> IngestProcessorOutput {
        let mut config = app.pipeline.config().clone();
        input.process(&mut app.clone(), &mut config).await.unwrap()
    }

    #[tokio::test]
    async fn test_payloads_then_queries() {
        let app = app_config();
        let payloads = vec![line("bitcoin", 100, NOW - 400), line("bitcoin", 110, NOW)];

        match run(&app, IngestProcessorInput::ProcessPayloads(payloads)).await {
            IngestProcessorOutput::ProcessPayloads(report) => assert_eq!(report.succeeded, 2),
            other => panic!("unexpected output {:?}", other),
        }

        let range = RangeInputArgs {
            asset_id: "bitcoin".to_string(),
            from: NOW - 1_800,
            to: NOW,
        };
        match run(&app, IngestProcessorInput::GetAggregates(range.clone())).await {
            IngestProcessorOutput::GetAggregates(buckets) => assert_eq!(buckets.len(), 2),
            other => panic!("unexpected output {:?}", other),
        }
        match run(&app, IngestProcessorInput::GetRawEvents(range)).await {
            IngestProcessorOutput::GetRawEvents(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[1].price_usd, BigDecimal::from(110));
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_window_snapshot_uses_latest_price() {
        let app = app_config();
        run(
            &app,
            IngestProcessorInput::ProcessPayloads(vec![
                line("ethereum", 100, NOW - 600),
                line("ethereum", 110, NOW),
            ]),
        )
        .await;

        let args = GetWindowInputArgs {
            asset_id: "ethereum".to_string(),
            now: None,
        };
        match run(&app, IngestProcessorInput::GetWindow(args)).await {
            IngestProcessorOutput::GetWindow(snapshot) => {
                assert_eq!(snapshot.now, NOW);
                assert_eq!(snapshot.current_price, Some(BigDecimal::from(110)));
                assert_eq!(snapshot.stat.avg, Some(BigDecimal::from(105)));
                // (110 - 105) / 105 * 100 = 4.76
                assert_eq!(snapshot.signal, Signal::Bullish);
                assert_eq!(snapshot.window_end - snapshot.window_start, 2_099);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_window_for_unknown_asset_is_neutral() {
        let app = app_config();
        let args = GetWindowInputArgs {
            asset_id: "dogecoin".to_string(),
            now: Some(NOW),
        };
        match run(&app, IngestProcessorInput::GetWindow(args)).await {
            IngestProcessorOutput::GetWindow(snapshot) => {
                assert_eq!(snapshot.signal, Signal::Neutral);
                assert!(snapshot.current_price.is_none());
                assert!(snapshot.pct_change.is_none());
                assert_eq!(snapshot.stat.count, 0);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_queries_at_the_edge_of_time() {
        let app = app_config();
        run(&app, IngestProcessorInput::ProcessPayloads(vec![line("bitcoin", 100, NOW)])).await;

        let range = RangeInputArgs {
            asset_id: "bitcoin".to_string(),
            from: i64::MIN,
            to: i64::MAX,
        };
        match run(&app, IngestProcessorInput::GetAggregates(range)).await {
            IngestProcessorOutput::GetAggregates(buckets) => assert_eq!(buckets.len(), 1),
            other => panic!("unexpected output {:?}", other),
        }

        let args = GetWindowInputArgs {
            asset_id: "bitcoin".to_string(),
            now: Some(i64::MIN + 1),
        };
        match run(&app, IngestProcessorInput::GetWindow(args)).await {
            IngestProcessorOutput::GetWindow(snapshot) => {
                assert_eq!(snapshot.window_start, i64::MIN);
                assert!(snapshot.current_price.is_none());
                assert_eq!(snapshot.signal, Signal::Neutral);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_envelope_is_an_error() {
        let app = app_config();
        let mut config = AggregatorsConfig::default();
        let result = IngestProcessorInput::ProcessBatch(json!({"hello": "world"}))
            .process(&mut app.clone(), &mut config)
            .await;
        assert!(result.is_err());
    }
}
