use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bigdecimal::BigDecimal;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::errors::{IngestError, IngestResult};
use crate::price_store::db_types::PriceEvent;

/// Transport-level decoding of one opaque payload into bytes
pub trait PayloadDecoder: Send + Sync {
    fn decode(&self, raw: &str) -> IngestResult<Vec<u8>>;
}

/// Standard base64, as the stream transport delivers record data
#[derive(Debug, Default, Clone, Copy)]
pub struct Base64Decoder;

impl PayloadDecoder for Base64Decoder {
    fn decode(&self, raw: &str) -> IngestResult<Vec<u8>> {
        STANDARD
            .decode(raw.trim())
            .map_err(|e| IngestError::decode(format!("invalid base64 payload: {}", e)))
    }
}

/// Passes payload text through unchanged (already-decoded producers, CLI files)
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainDecoder;

impl PayloadDecoder for PlainDecoder {
    fn decode(&self, raw: &str) -> IngestResult<Vec<u8>> {
        Ok(raw.as_bytes().to_vec())
    }
}

/// One still-encoded payload from a delivered batch
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EncodedPayload {
    pub data: String,
    /// Arrival time reported by the transport, epoch seconds
    pub arrival_ts: Option<i64>,
}

impl EncodedPayload {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            arrival_ts: None,
        }
    }
}

#[derive(Deserialize, Debug)]
struct StreamRecord {
    kinesis: StreamRecordData,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StreamRecordData {
    data: String,
    approximate_arrival_timestamp: Option<f64>,
}

/// Reads the trigger payload `{"Records": [{"kinesis": {"data": ..}}]}` into encoded payloads.
///
/// A body without a `Records` array is a batch-level failure. A malformed
/// record only fails its own slot, in delivery order.
pub fn parse_envelope(body: &Value) -> IngestResult<Vec<IngestResult<EncodedPayload>>> {
    let records = body
        .get("Records")
        .and_then(Value::as_array)
        .ok_or_else(|| IngestError::InvalidEnvelope("not a stream event: missing 'Records' array".to_string()))?;

    Ok(records.iter().enumerate().map(|(i, r)| parse_record(i, r)).collect())
}

fn parse_record(index: usize, record: &Value) -> IngestResult<EncodedPayload> {
    let record: StreamRecord = serde_json::from_value(record.clone())
        .map_err(|e| IngestError::decode(format!("record {}: {}", index, e)))?;

    let arrival_ts = match record.kinesis.approximate_arrival_timestamp {
        Some(ts) => Some(epoch_seconds("approximateArrivalTimestamp", ts)?),
        None => None,
    };

    Ok(EncodedPayload {
        data: record.kinesis.data,
        arrival_ts,
    })
}

/// Parses decoded payload bytes into a price event.
///
/// Accepted shapes:
/// - `{"<asset>": {"usd": .., "usd_market_cap": .., "usd_24h_vol": .., "usd_24h_change": ..}}`
/// - `{"crypto": "<asset>", "price_usd": ..}`
/// - `{"crypto": "<asset>", "price": .., "market_cap": .., "24hr_vol": .., "24hr_change": ..}`
///
/// An explicit `observed_at` (or the quote's `last_updated_at`) wins over `fallback_ts`.
pub fn parse_price_event(bytes: &[u8], fallback_ts: i64) -> IngestResult<PriceEvent> {
    let value: Value = serde_json::from_slice(bytes)?;
    let obj = value
        .as_object()
        .ok_or_else(|| IngestError::decode("payload must be a JSON object"))?;

    if obj.contains_key("crypto") {
        parse_flat(obj, fallback_ts)
    } else {
        parse_keyed(obj, fallback_ts)
    }
}

fn parse_keyed(obj: &Map<String, Value>, fallback_ts: i64) -> IngestResult<PriceEvent> {
    if obj.len() != 1 {
        return Err(IngestError::decode(format!(
            "expected exactly one asset key, found {}",
            obj.len()
        )));
    }

    let (asset, quote) = obj
        .iter()
        .next()
        .ok_or_else(|| IngestError::decode("empty payload"))?;
    let quote = quote
        .as_object()
        .ok_or_else(|| IngestError::decode(format!("quote for '{}' is not an object", asset)))?;

    let observed_at = optional_ts(quote, "observed_at")?
        .or(optional_ts(quote, "last_updated_at")?)
        .unwrap_or(fallback_ts);

    Ok(PriceEvent {
        asset_id: asset_id(asset)?,
        price: required_decimal(quote, "usd")?,
        observed_at,
        market_cap: optional_decimal(quote, "usd_market_cap")?,
        volume_24h: optional_decimal(quote, "usd_24h_vol")?,
        change_24h: optional_decimal(quote, "usd_24h_change")?,
    })
}

fn parse_flat(obj: &Map<String, Value>, fallback_ts: i64) -> IngestResult<PriceEvent> {
    let asset = obj
        .get("crypto")
        .and_then(Value::as_str)
        .ok_or_else(|| IngestError::decode("'crypto' must be a string"))?;

    let price = match optional_decimal(obj, "price_usd")? {
        Some(price) => price,
        None => required_decimal(obj, "price")?,
    };

    Ok(PriceEvent {
        asset_id: asset_id(asset)?,
        price,
        observed_at: optional_ts(obj, "observed_at")?.unwrap_or(fallback_ts),
        market_cap: optional_decimal(obj, "market_cap")?,
        volume_24h: optional_decimal(obj, "24hr_vol")?,
        change_24h: optional_decimal(obj, "24hr_change")?,
    })
}

fn asset_id(raw: &str) -> IngestResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IngestError::decode("asset id is empty"));
    }
    Ok(trimmed.to_string())
}

fn to_decimal(field: &str, value: &Value) -> IngestResult<BigDecimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => {
            return Err(IngestError::decode(format!(
                "'{}' must be numeric, got {}",
                field, other
            )));
        }
    };

    BigDecimal::from_str(&text)
        .map_err(|e| IngestError::decode(format!("'{}' is not a decimal: {}", field, e)))
}

fn required_decimal(obj: &Map<String, Value>, field: &str) -> IngestResult<BigDecimal> {
    optional_decimal(obj, field)?
        .ok_or_else(|| IngestError::decode(format!("missing field '{}'", field)))
}

fn optional_decimal(obj: &Map<String, Value>, field: &str) -> IngestResult<Option<BigDecimal>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => to_decimal(field, value).map(Some),
    }
}

fn optional_ts(obj: &Map<String, Value>, field: &str) -> IngestResult<Option<i64>> {
    let value = match obj.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };

    let secs = match (value.as_i64(), value.as_f64()) {
        (Some(secs), _) => secs,
        (None, Some(f)) => return epoch_seconds(field, f).map(Some),
        (None, None) => {
            return Err(IngestError::decode(format!("'{}' must be epoch seconds", field)));
        }
    };

    representable(field, secs).map(Some)
}

/// Floors fractional epoch seconds, rejecting values no timestamp can hold.
fn epoch_seconds(field: &str, value: f64) -> IngestResult<i64> {
    let floored = value.floor();
    // i64::MAX as f64 rounds up to 2^63, hence the exclusive upper bound
    if !floored.is_finite() || floored < i64::MIN as f64 || floored >= i64::MAX as f64 {
        return Err(IngestError::decode(format!(
            "'{}' is out of range: {}",
            field, value
        )));
    }
    representable(field, floored as i64)
}

fn representable(field: &str, secs: i64) -> IngestResult<i64> {
    DateTime::from_timestamp(secs, 0)
        .map(|_| secs)
        .ok_or_else(|| IngestError::decode(format!("'{}' is out of range: {}", field, secs)))
}
