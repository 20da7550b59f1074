use bigdecimal::BigDecimal;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::aggregators::config::AggregatorsConfig;
use crate::aggregators::processor::WindowAggregator;
use crate::aggregators::signal::classify;
use crate::aggregators::time_series;
use crate::errors::{IngestError, IngestResult};
use crate::ingest::clock::{Clock, SystemClock};
use crate::ingest::decode::{parse_envelope, parse_price_event, Base64Decoder, EncodedPayload, PayloadDecoder};
use crate::ingest::models::{BatchReport, EventFailure, EventOutcome, IngestStage, IngestedEvent, SkipReason};
use crate::ingest::notifier::{LogNotifier, SignalNotification, SignalNotifier};
use crate::price_store::db_types::{PriceEvent, WindowResult};
use crate::price_store::operations::{AggregateStore, RawEventStore};

/**
 * Per event state machine:
 *   Decode -> AppendRaw -> Accumulate -> ComputeWindow -> classify -> Persist
 * Any stage failing ends that event as Failed and the batch moves on. Nothing is
 * rolled back: a raw append followed by a failed accumulate leaves history ahead of
 * the aggregates, which can be rebuilt from the raw store.
 */
pub struct IngestPipeline {
    aggregates: Arc<dyn AggregateStore>,
    raw: Arc<dyn RawEventStore>,
    decoder: Arc<dyn PayloadDecoder>,
    notifier: Arc<dyn SignalNotifier>,
    clock: Arc<dyn Clock>,
    config: AggregatorsConfig,
}

impl IngestPipeline {
    /// Validates `config` up front so bucket math below never sees a zero size.
    pub fn new(
        aggregates: Arc<dyn AggregateStore>,
        raw: Arc<dyn RawEventStore>,
        config: AggregatorsConfig,
    ) -> IngestResult<Self> {
        config.validate()?;

        Ok(Self {
            aggregates,
            raw,
            decoder: Arc::new(Base64Decoder),
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            config,
        })
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn PayloadDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SignalNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AggregatorsConfig {
        &self.config
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn aggregates(&self) -> &dyn AggregateStore {
        self.aggregates.as_ref()
    }

    pub fn raw_events(&self) -> &dyn RawEventStore {
        self.raw.as_ref()
    }

    pub fn window_aggregator(&self) -> WindowAggregator<'_> {
        WindowAggregator::new(
            self.aggregates.as_ref(),
            self.raw.as_ref(),
            self.config.window_source,
        )
    }

    /// Entry point for a raw trigger body. Only a body without a `Records` array
    /// fails the call, a malformed record fails its own slot at stage Decode.
    pub fn process_envelope(&self, body: &Value) -> IngestResult<BatchReport> {
        let records = parse_envelope(body)?;
        Ok(self.run_batch(records.iter().map(Result::as_ref).collect()))
    }

    /// Processes a delivered batch, isolating failures per event.
    pub fn process_batch(&self, payloads: &[EncodedPayload]) -> BatchReport {
        self.run_batch(payloads.iter().map(Ok).collect())
    }

    fn run_batch(&self, records: Vec<Result<&EncodedPayload, &IngestError>>) -> BatchReport {
        let outcomes = if self.config.parallel_assets {
            self.process_partitioned(records)
        } else {
            records
                .into_iter()
                .map(|record| match self.decode(record) {
                    Ok(event) => self.process_event(&event),
                    Err(outcome) => outcome,
                })
                .collect()
        };

        let report = BatchReport::from_outcomes(outcomes);
        tracing::info!(
            batch_id = %report.batch_id,
            total = report.total,
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            "batch processed"
        );
        report
    }

    pub fn process_payload(&self, payload: &EncodedPayload) -> EventOutcome {
        match self.decode(Ok(payload)) {
            Ok(event) => self.process_event(&event),
            Err(outcome) => outcome,
        }
    }

    /// Runs an already decoded event through the remaining stages
    pub fn process_event(&self, event: &PriceEvent) -> EventOutcome {
        if let Some(skip) = self.skip_reason(event) {
            tracing::warn!(asset_id = %event.asset_id, observed_at = event.observed_at, %skip, "event skipped");
            return EventOutcome::Skipped {
                asset_id: event.asset_id.clone(),
                skip,
            };
        }

        match self.ingest(event) {
            Ok(ingested) => EventOutcome::Success(ingested),
            Err((stage, e)) => {
                tracing::error!(
                    asset_id = %event.asset_id,
                    observed_at = event.observed_at,
                    stage = %stage,
                    retryable = e.is_retryable(),
                    error = %e,
                    "event failed"
                );
                EventOutcome::Failed(EventFailure::new(
                    Some(event.asset_id.clone()),
                    Some(event.observed_at),
                    stage,
                    &e,
                ))
            }
        }
    }

    fn decode(&self, record: Result<&EncodedPayload, &IngestError>) -> Result<PriceEvent, EventOutcome> {
        let payload = record.map_err(decode_failure)?;
        let fallback_ts = payload.arrival_ts.unwrap_or_else(|| self.clock.now());

        self.decoder
            .decode(&payload.data)
            .and_then(|bytes| parse_price_event(&bytes, fallback_ts))
            .map_err(|e| decode_failure(&e))
    }

    fn skip_reason(&self, event: &PriceEvent) -> Option<SkipReason> {
        if event.price <= BigDecimal::from(0) {
            return Some(SkipReason::NonPositivePrice);
        }

        let max_age = self.config.max_event_age_secs?;
        let age_secs = self.clock.now().saturating_sub(event.observed_at);
        (age_secs > max_age).then_some(SkipReason::Stale { age_secs })
    }

    fn ingest(&self, event: &PriceEvent) -> Result<IngestedEvent, (IngestStage, IngestError)> {
        let asset_id = event.asset_id.as_str();
        let bucket_size = self.config.bucket_size_seconds;

        self.raw
            .append(&event.to_raw_record())
            .map_err(|e| (IngestStage::AppendRaw, e))?;

        let bucket_start = time_series::align(event.observed_at, bucket_size);
        self.aggregates
            .accumulate(asset_id, bucket_start, &event.price)
            .map_err(|e| (IngestStage::Accumulate, e))?;

        // the window trails the event itself, not the wall clock
        let stat = self
            .window_aggregator()
            .compute(asset_id, event.observed_at, self.config.window_seconds(), bucket_size)
            .map_err(|e| (IngestStage::ComputeWindow, e))?;

        let classification = classify(&event.price, stat.avg.as_ref(), &self.config.signal_threshold_pct);

        let result = WindowResult {
            stat,
            signal: classification.signal,
            pct_change: classification.pct_change,
        };
        self.aggregates
            .write_window_result(asset_id, bucket_start, &result)
            .map_err(|e| (IngestStage::Persist, e))?;

        tracing::debug!(
            asset_id,
            bucket_start,
            signal = %result.signal,
            "event ingested"
        );

        if result.signal.is_actionable() {
            self.notify(event, &result);
        }

        Ok(IngestedEvent {
            asset_id: event.asset_id.clone(),
            observed_at: event.observed_at,
            bucket_start,
            price: event.price.clone(),
            result,
        })
    }

    fn notify(&self, event: &PriceEvent, result: &WindowResult) {
        let notification = SignalNotification {
            asset_id: event.asset_id.clone(),
            signal: result.signal,
            pct_change: result.pct_change.clone(),
            price: event.price.clone(),
            avg: result.stat.avg.clone(),
        };

        // notification is downstream of the store write and never fails the event
        if let Err(e) = self.notifier.notify(&notification) {
            tracing::warn!(asset_id = %event.asset_id, error = %e, "signal notification failed");
        }
    }

    /// Decodes everything first, then runs each asset's events on its own scoped
    /// thread. Order within an asset is preserved; outcomes come back in delivery order.
    ///
    /// Workers record each outcome as soon as it exists, so a worker that panics
    /// only loses the event it was on and the ones queued behind it.
    fn process_partitioned(&self, records: Vec<Result<&EncodedPayload, &IngestError>>) -> Vec<EventOutcome> {
        let mut decoded: Vec<Option<EventOutcome>> = vec![None; records.len()];
        let mut by_asset: BTreeMap<String, Vec<(usize, PriceEvent)>> = BTreeMap::new();

        for (idx, record) in records.into_iter().enumerate() {
            match self.decode(record) {
                Ok(event) => by_asset
                    .entry(event.asset_id.clone())
                    .or_default()
                    .push((idx, event)),
                Err(outcome) => decoded[idx] = Some(outcome),
            }
        }

        let slots = Mutex::new(decoded);

        std::thread::scope(|scope| {
            let handles: Vec<_> = by_asset
                .into_values()
                .map(|events| {
                    let indices: Vec<(usize, String, i64)> = events
                        .iter()
                        .map(|(idx, e)| (*idx, e.asset_id.clone(), e.observed_at))
                        .collect();
                    let slots = &slots;
                    let handle = scope.spawn(move || {
                        for (idx, event) in events {
                            let outcome = self.process_event(&event);
                            slots.lock().unwrap_or_else(PoisonError::into_inner)[idx] = Some(outcome);
                        }
                    });
                    (indices, handle)
                })
                .collect();

            for (indices, handle) in handles {
                if handle.join().is_ok() {
                    continue;
                }

                let e = IngestError::storage("asset worker panicked");
                let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
                for (idx, asset_id, observed_at) in indices {
                    if slots[idx].is_some() {
                        continue;
                    }
                    tracing::error!(%asset_id, observed_at, stage = %IngestStage::Unknown, error = %e, "event failed");
                    slots[idx] = Some(EventOutcome::Failed(EventFailure::new(
                        Some(asset_id),
                        Some(observed_at),
                        IngestStage::Unknown,
                        &e,
                    )));
                }
            }
        });

        slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .map(|o| {
                o.unwrap_or_else(|| {
                    EventOutcome::Failed(EventFailure::new(
                        None,
                        None,
                        IngestStage::Unknown,
                        &IngestError::storage("event produced no outcome"),
                    ))
                })
            })
            .collect()
    }
}

fn decode_failure(e: &IngestError) -> EventOutcome {
    tracing::error!(stage = %IngestStage::Decode, error = %e, "event failed");
    EventOutcome::Failed(EventFailure::new(None, None, IngestStage::Decode, e))
}
