use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::ops::Add;

use crate::price_store::db_types::{BucketAggregate, RawRecord};

/// Which store a window statistic was built from
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatSource {
    Buckets,
    Raw,
}

/// Moving-window statistic over a contiguous run of buckets (or raw events)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WindowStat {
    pub sum: BigDecimal,
    pub count: i64,
    /// `None` when `count == 0`, never a masked zero
    pub avg: Option<BigDecimal>,
    /// Only known when built from raw events
    pub min: Option<BigDecimal>,
    pub max: Option<BigDecimal>,
    pub source: StatSource,
}

impl WindowStat {
    pub fn has_data(&self) -> bool {
        self.count > 0
    }

    /// Sums bucket aggregates. Buckets keep no per-event extremes, so min/max stay unknown.
    pub fn from_buckets(buckets: &[BucketAggregate]) -> Self {
        let sum = buckets
            .iter()
            .fold(BigDecimal::from(0), |acc, b| acc.add(&b.sum));
        let count = buckets.iter().map(|b| b.count).sum::<i64>();

        Self {
            avg: mean(&sum, count),
            sum,
            count,
            min: None,
            max: None,
            source: StatSource::Buckets,
        }
    }

    /// Sums individual raw prices, tracking extremes along the way.
    pub fn from_raw(records: &[RawRecord]) -> Self {
        let sum = records
            .iter()
            .fold(BigDecimal::from(0), |acc, r| acc.add(&r.price_usd));
        let count = records.len() as i64;

        let min = records.iter().map(|r| r.price_usd.clone()).min();
        let max = records.iter().map(|r| r.price_usd.clone()).max();

        Self {
            avg: mean(&sum, count),
            sum,
            count,
            min,
            max,
            source: StatSource::Raw,
        }
    }
}

fn mean(sum: &BigDecimal, count: i64) -> Option<BigDecimal> {
    if count > 0 {
        Some(sum / BigDecimal::from(count))
    } else {
        None
    }
}
