use bigdecimal::BigDecimal;
use diesel::QueryableByName;
use diesel::sql_types::{BigInt, Nullable, Numeric, Text};
use serde::{Deserialize, Serialize};

use crate::aggregators::signal::Signal;
use crate::aggregators::aggregation_block::WindowStat;

/// A single decoded price observation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PriceEvent {
    pub asset_id: String,
    pub price: BigDecimal,
    /// Epoch seconds
    pub observed_at: i64,
    pub market_cap: Option<BigDecimal>,
    pub volume_24h: Option<BigDecimal>,
    pub change_24h: Option<BigDecimal>,
}

impl PriceEvent {
    pub fn new(asset_id: impl Into<String>, price: BigDecimal, observed_at: i64) -> Self {
        Self {
            asset_id: asset_id.into(),
            price,
            observed_at,
            market_cap: None,
            volume_24h: None,
            change_24h: None,
        }
    }

    pub fn to_raw_record(&self) -> RawRecord {
        RawRecord {
            asset_id: self.asset_id.clone(),
            observed_at: self.observed_at,
            price_usd: self.price.clone(),
            market_cap_usd: self.market_cap.clone(),
            hr24_volume: self.volume_24h.clone(),
            hr24_change: self.change_24h.clone(),
        }
    }
}

/// Append-only raw history, keyed (non-uniquely) by (asset_id, observed_at)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, QueryableByName)]
pub struct RawRecord {
    #[diesel(sql_type = Text)]
    pub asset_id: String,
    #[diesel(sql_type = BigInt)]
    pub observed_at: i64,
    #[diesel(sql_type = Numeric)]
    pub price_usd: BigDecimal,
    #[diesel(sql_type = Nullable<Numeric>)]
    pub market_cap_usd: Option<BigDecimal>,
    #[diesel(sql_type = Nullable<Numeric>)]
    pub hr24_volume: Option<BigDecimal>,
    #[diesel(sql_type = Nullable<Numeric>)]
    pub hr24_change: Option<BigDecimal>,
}

/// Per (asset_id, bucket_start) running aggregate plus the derived window fields
/// last written for that bucket.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BucketAggregate {
    pub asset_id: String,
    pub bucket_start: i64,
    pub sum: BigDecimal,
    pub count: i64,
    pub moving_avg: Option<BigDecimal>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
    pub signal: Option<Signal>,
    pub pct_change: Option<BigDecimal>,
}

impl BucketAggregate {
    pub fn new(asset_id: impl Into<String>, bucket_start: i64) -> Self {
        Self {
            asset_id: asset_id.into(),
            bucket_start,
            sum: BigDecimal::from(0),
            count: 0,
            moving_avg: None,
            min_price: None,
            max_price: None,
            signal: None,
            pct_change: None,
        }
    }

    /// Mean of this bucket alone, `None` while empty
    pub fn mean(&self) -> Option<BigDecimal> {
        if self.count > 0 {
            Some(&self.sum / BigDecimal::from(self.count))
        } else {
            None
        }
    }

    pub fn apply_window_result(&mut self, result: &WindowResult) {
        self.moving_avg = result.stat.avg.clone();
        self.min_price = result.stat.min.clone();
        self.max_price = result.stat.max.clone();
        self.signal = Some(result.signal);
        self.pct_change = result.pct_change.clone();
    }
}

/// Derived fields overwritten (SET semantics) on the current bucket after each ingest
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WindowResult {
    pub stat: WindowStat,
    pub signal: Signal,
    pub pct_change: Option<BigDecimal>,
}
