use crate::aggregators::aggregation_block::WindowStat;
use crate::aggregators::config::WindowSource;
use crate::aggregators::time_series;
use crate::errors::IngestResult;
use crate::price_store::operations::{AggregateStore, RawEventStore};

/// Builds the trailing-window statistic for an asset.
///
/// Bucket aggregates are the preferred path (one read per bucket in the window).
/// Raw events are summed instead when configured to, or under `Auto` when no bucket
/// exists yet for the window. Both paths cover the same bucket-aligned span, so
/// they agree on `sum`/`count` for the same history.
///
/// Storage failures propagate untouched; there is no retry here.
pub struct WindowAggregator<'a> {
    aggregates: &'a dyn AggregateStore,
    raw: &'a dyn RawEventStore,
    source: WindowSource,
}

impl<'a> WindowAggregator<'a> {
    pub fn new(
        aggregates: &'a dyn AggregateStore,
        raw: &'a dyn RawEventStore,
        source: WindowSource,
    ) -> Self {
        Self {
            aggregates,
            raw,
            source,
        }
    }

    pub fn compute(
        &self,
        asset_id: &str,
        now: i64,
        window: i64,
        bucket_size: i64,
    ) -> IngestResult<WindowStat> {
        let (from_bucket, to_bucket) = time_series::window_bounds(now, window, bucket_size);

        match self.source {
            WindowSource::Raw => self.from_raw(asset_id, from_bucket, to_bucket, bucket_size),
            WindowSource::Buckets => {
                let buckets = self.aggregates.query_range(asset_id, from_bucket, to_bucket)?;
                Ok(WindowStat::from_buckets(&buckets))
            }
            WindowSource::Auto => {
                let buckets = self.aggregates.query_range(asset_id, from_bucket, to_bucket)?;
                if buckets.is_empty() {
                    tracing::debug!(
                        asset_id,
                        from_bucket,
                        to_bucket,
                        "no bucket aggregates in window, falling back to raw events"
                    );
                    return self.from_raw(asset_id, from_bucket, to_bucket, bucket_size);
                }
                Ok(WindowStat::from_buckets(&buckets))
            }
        }
    }

    fn from_raw(
        &self,
        asset_id: &str,
        from_bucket: i64,
        to_bucket: i64,
        bucket_size: i64,
    ) -> IngestResult<WindowStat> {
        let records = self.raw.query_range(
            asset_id,
            from_bucket,
            time_series::bucket_end(to_bucket, bucket_size),
        )?;
        Ok(WindowStat::from_raw(&records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregators::aggregation_block::StatSource;
    use crate::aggregators::signal::{classify, Signal};
    use crate::price_store::db_types::PriceEvent;
    use crate::price_store::memory::{MemoryAggregateStore, MemoryRawEventStore};
    use bigdecimal::BigDecimal;

    const BUCKET: i64 = 300;
    const WINDOW: i64 = 1800;

    fn seed(aggs: &MemoryAggregateStore, raw: &MemoryRawEventStore, events: &[(i64, i64)]) {
        for (ts, price) in events {
            let event = PriceEvent::new("bitcoin", BigDecimal::from(*price), *ts);
            raw.append(&event.to_raw_record()).unwrap();
            aggs.accumulate("bitcoin", time_series::align(*ts, BUCKET), &event.price)
                .unwrap();
        }
    }

    #[test]
    fn test_empty_asset_has_no_average_and_is_neutral() {
        let aggs = MemoryAggregateStore::new();
        let raw = MemoryRawEventStore::new();

        for source in [WindowSource::Auto, WindowSource::Buckets, WindowSource::Raw] {
            let stat = WindowAggregator::new(&aggs, &raw, source)
                .compute("bitcoin", 10_000, WINDOW, BUCKET)
                .unwrap();
            assert!(stat.avg.is_none());
            assert_eq!(stat.count, 0);

            let c = classify(&BigDecimal::from(100), stat.avg.as_ref(), &BigDecimal::from(2));
            assert_eq!(c.signal, Signal::Neutral);
        }
    }

    #[test]
    fn test_bucket_path_has_no_extremes() {
        let aggs = MemoryAggregateStore::new();
        let raw = MemoryRawEventStore::new();
        seed(&aggs, &raw, &[(9_000, 100), (9_100, 120), (9_400, 110)]);

        let stat = WindowAggregator::new(&aggs, &raw, WindowSource::Buckets)
            .compute("bitcoin", 9_500, WINDOW, BUCKET)
            .unwrap();
        assert_eq!(stat.count, 3);
        assert_eq!(stat.avg, Some(BigDecimal::from(110)));
        assert!(stat.min.is_none() && stat.max.is_none());
        assert_eq!(stat.source, StatSource::Buckets);
    }

    #[test]
    fn test_raw_path_agrees_with_buckets_and_reports_extremes() {
        let aggs = MemoryAggregateStore::new();
        let raw = MemoryRawEventStore::new();
        seed(&aggs, &raw, &[(9_000, 100), (9_100, 120), (9_400, 110)]);

        let by_buckets = WindowAggregator::new(&aggs, &raw, WindowSource::Buckets)
            .compute("bitcoin", 9_500, WINDOW, BUCKET)
            .unwrap();
        let by_raw = WindowAggregator::new(&aggs, &raw, WindowSource::Raw)
            .compute("bitcoin", 9_500, WINDOW, BUCKET)
            .unwrap();

        assert_eq!(by_raw.sum, by_buckets.sum);
        assert_eq!(by_raw.count, by_buckets.count);
        assert_eq!(by_raw.min, Some(BigDecimal::from(100)));
        assert_eq!(by_raw.max, Some(BigDecimal::from(120)));
        assert_eq!(by_raw.source, StatSource::Raw);
    }

    #[test]
    fn test_auto_falls_back_to_raw_when_buckets_missing() {
        let aggs = MemoryAggregateStore::new();
        let raw = MemoryRawEventStore::new();
        raw.append(&PriceEvent::new("bitcoin", BigDecimal::from(50), 9_000).to_raw_record())
            .unwrap();

        let stat = WindowAggregator::new(&aggs, &raw, WindowSource::Auto)
            .compute("bitcoin", 9_100, WINDOW, BUCKET)
            .unwrap();
        assert_eq!(stat.source, StatSource::Raw);
        assert_eq!(stat.avg, Some(BigDecimal::from(50)));
    }

    #[test]
    fn test_window_edge_is_bucket_aligned() {
        let aggs = MemoryAggregateStore::new();
        let raw = MemoryRawEventStore::new();
        // now = 10_000, window starts at align(8_200) = 8_100
        seed(&aggs, &raw, &[(8_099, 1_000), (8_100, 10), (8_150, 20), (10_000, 30)]);

        let stat = WindowAggregator::new(&aggs, &raw, WindowSource::Buckets)
            .compute("bitcoin", 10_000, WINDOW, BUCKET)
            .unwrap();
        // 8_150 is older than now - window but shares the first bucket, so it counts
        assert_eq!(stat.count, 3);
        assert_eq!(stat.sum, BigDecimal::from(60));
    }
}
