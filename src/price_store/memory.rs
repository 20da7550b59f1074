use bigdecimal::BigDecimal;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::errors::{IngestError, IngestResult};
use crate::price_store::db_types::{BucketAggregate, RawRecord, WindowResult};
use crate::price_store::operations::{AggregateStore, RawEventStore};

fn lock<T>(m: &Mutex<T>) -> IngestResult<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| IngestError::storage("in-memory store lock poisoned"))
}

/// In-memory aggregates keyed by (asset_id, bucket_start).
///
/// Used by tests and by database-less runs; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryAggregateStore {
    buckets: Mutex<BTreeMap<(String, i64), BucketAggregate>>,
}

impl MemoryAggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct (asset, bucket) keys
    pub fn len(&self) -> usize {
        self.buckets.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, asset_id: &str, bucket_start: i64) -> Option<BucketAggregate> {
        self.buckets
            .lock()
            .ok()
            .and_then(|b| b.get(&(asset_id.to_string(), bucket_start)).cloned())
    }
}

impl AggregateStore for MemoryAggregateStore {
    fn accumulate(&self, asset_id: &str, bucket_start: i64, price: &BigDecimal) -> IngestResult<()> {
        let mut buckets = lock(&self.buckets)?;
        let entry = buckets
            .entry((asset_id.to_string(), bucket_start))
            .or_insert_with(|| BucketAggregate::new(asset_id, bucket_start));

        entry.sum += price;
        entry.count += 1;
        Ok(())
    }

    fn write_window_result(
        &self,
        asset_id: &str,
        bucket_start: i64,
        result: &WindowResult,
    ) -> IngestResult<()> {
        let mut buckets = lock(&self.buckets)?;
        match buckets.get_mut(&(asset_id.to_string(), bucket_start)) {
            Some(bucket) => {
                bucket.apply_window_result(result);
                Ok(())
            }
            None => Err(IngestError::storage(format!(
                "no aggregate for asset {} at bucket {}",
                asset_id, bucket_start
            ))),
        }
    }

    fn query_range(
        &self,
        asset_id: &str,
        from_bucket: i64,
        to_bucket: i64,
    ) -> IngestResult<Vec<BucketAggregate>> {
        if from_bucket > to_bucket {
            return Ok(Vec::new());
        }

        let buckets = lock(&self.buckets)?;
        let from = (asset_id.to_string(), from_bucket);
        let to = (asset_id.to_string(), to_bucket);

        Ok(buckets.range(from..=to).map(|(_, b)| b.clone()).collect())
    }
}

/// In-memory raw history per asset, kept ordered by `observed_at`.
#[derive(Debug, Default)]
pub struct MemoryRawEventStore {
    records: Mutex<BTreeMap<String, Vec<RawRecord>>>,
}

impl MemoryRawEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records across all assets
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .map(|r| r.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RawEventStore for MemoryRawEventStore {
    fn append(&self, record: &RawRecord) -> IngestResult<()> {
        let mut records = lock(&self.records)?;
        let series = records.entry(record.asset_id.clone()).or_default();

        // insert after any equal timestamps so duplicates keep arrival order
        let idx = series.partition_point(|r| r.observed_at <= record.observed_at);
        series.insert(idx, record.clone());
        Ok(())
    }

    fn query_range(&self, asset_id: &str, from_ts: i64, to_ts: i64) -> IngestResult<Vec<RawRecord>> {
        let records = lock(&self.records)?;
        Ok(records
            .get(asset_id)
            .map(|series| {
                series
                    .iter()
                    .filter(|r| r.observed_at >= from_ts && r.observed_at <= to_ts)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn latest(&self, asset_id: &str, at: i64) -> IngestResult<Option<RawRecord>> {
        let records = lock(&self.records)?;
        Ok(records
            .get(asset_id)
            .and_then(|series| series.iter().rev().find(|r| r.observed_at <= at).cloned()))
    }
}
