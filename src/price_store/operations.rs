use bigdecimal::BigDecimal;

use crate::errors::IngestResult;
use crate::price_store::db_types::{BucketAggregate, RawRecord, WindowResult};

/// Durable per-(asset, bucket) aggregates.
///
/// Implementations must make `accumulate` an atomic ADD on both `sum` and `count`
/// under concurrent writers to the same key. There is no dedup key: applying the
/// same call twice counts the price twice.
pub trait AggregateStore: Send + Sync {
    /// Upsert with ADD semantics, creating the bucket when absent.
    fn accumulate(&self, asset_id: &str, bucket_start: i64, price: &BigDecimal) -> IngestResult<()>;

    /// Overwrites the derived window fields on an existing bucket. Last writer wins.
    fn write_window_result(
        &self,
        asset_id: &str,
        bucket_start: i64,
        result: &WindowResult,
    ) -> IngestResult<()>;

    /// Inclusive range scan ordered by `bucket_start` ascending; empty when nothing exists.
    fn query_range(
        &self,
        asset_id: &str,
        from_bucket: i64,
        to_bucket: i64,
    ) -> IngestResult<Vec<BucketAggregate>>;
}

/// Append-only raw history, the source of truth aggregates can be rebuilt from.
pub trait RawEventStore: Send + Sync {
    /// Plain insert, duplicates of (asset_id, observed_at) are kept.
    fn append(&self, record: &RawRecord) -> IngestResult<()>;

    /// Inclusive scan ordered by `observed_at` ascending.
    fn query_range(&self, asset_id: &str, from_ts: i64, to_ts: i64) -> IngestResult<Vec<RawRecord>>;

    /// Most recent record for the asset at or before `at`
    fn latest(&self, asset_id: &str, at: i64) -> IngestResult<Option<RawRecord>>;
}
