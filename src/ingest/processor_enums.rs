use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregators::aggregation_block::WindowStat;
use crate::aggregators::signal::Signal;
use crate::ingest::decode::EncodedPayload;
use crate::ingest::models::BatchReport;
use crate::price_store::db_types::{BucketAggregate, RawRecord};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RangeInputArgs {
    pub asset_id: String,
    /// Inclusive, epoch seconds
    pub from: i64,
    /// Inclusive, epoch seconds
    pub to: i64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GetWindowInputArgs {
    pub asset_id: String,
    /// Defaults to the clock
    pub now: Option<i64>,
}

/// Window statistic plus the classification of the latest known price against it
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub asset_id: String,
    pub now: i64,
    pub window_start: i64,
    pub window_end: i64,
    pub current_price: Option<BigDecimal>,
    pub stat: WindowStat,
    pub signal: Signal,
    pub pct_change: Option<BigDecimal>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub enum IngestProcessorInput {
    /// A raw trigger body carrying a `Records` envelope
    ProcessBatch(Value),
    /// Individual payloads, outside of any envelope
    ProcessPayloads(Vec<EncodedPayload>),
    GetAggregates(RangeInputArgs),
    GetRawEvents(RangeInputArgs),
    GetWindow(GetWindowInputArgs),
}

#[derive(Deserialize, Serialize, Debug)]
pub enum IngestProcessorOutput {
    ProcessBatch(BatchReport),
    ProcessPayloads(BatchReport),
    GetAggregates(Vec<BucketAggregate>),
    GetRawEvents(Vec<RawRecord>),
    GetWindow(WindowSnapshot),
}
