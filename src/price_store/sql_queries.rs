use bigdecimal::BigDecimal;
use diesel::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_types::{BigInt, Nullable, Numeric, Text};
use std::str::FromStr;

use crate::errors::{IngestError, IngestResult};
use crate::price_store::config::StoreConfig;
use crate::price_store::db_types::{BucketAggregate, RawRecord, WindowResult};
use crate::price_store::operations::{AggregateStore, RawEventStore};
use crate::utils::commons::DbPool;
use crate::utils::db::get_conn;

const CREATE_RAW_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS {raw} (
    id BIGSERIAL PRIMARY KEY,
    asset_id TEXT NOT NULL,
    observed_at BIGINT NOT NULL,
    price_usd NUMERIC NOT NULL,
    market_cap_usd NUMERIC,
    hr24_volume NUMERIC,
    hr24_change NUMERIC,
    loaded_at TIMESTAMP NOT NULL DEFAULT NOW()
);
";

const CREATE_RAW_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS {raw}_asset_time_idx ON {raw} (asset_id, observed_at);
";

const CREATE_AGG_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS {agg} (
    asset_id TEXT NOT NULL,
    bucket_start BIGINT NOT NULL,
    price_sum NUMERIC NOT NULL DEFAULT 0,
    price_count BIGINT NOT NULL DEFAULT 0,
    moving_avg NUMERIC,
    min_price NUMERIC,
    max_price NUMERIC,
    signal TEXT,
    pct_change NUMERIC,
    PRIMARY KEY (asset_id, bucket_start)
);
";

// single statement so the increment of both counters is atomic per key
const ACCUMULATE: &str = r"
INSERT INTO {agg} (asset_id, bucket_start, price_sum, price_count)
VALUES ($1, $2, $3, 1)
ON CONFLICT (asset_id, bucket_start)
DO UPDATE SET
    price_sum = {agg}.price_sum + EXCLUDED.price_sum,
    price_count = {agg}.price_count + 1;
";

const WRITE_WINDOW_RESULT: &str = r"
UPDATE {agg}
SET moving_avg = $3,
    min_price = $4,
    max_price = $5,
    signal = $6,
    pct_change = $7
WHERE asset_id = $1 AND bucket_start = $2;
";

const AGG_RANGE: &str = r"
SELECT asset_id, bucket_start, price_sum, price_count, moving_avg, min_price, max_price, signal, pct_change
FROM {agg}
WHERE asset_id = $1 AND bucket_start BETWEEN $2 AND $3
ORDER BY bucket_start ASC;
";

const RAW_INSERT: &str = r"
INSERT INTO {raw} (asset_id, observed_at, price_usd, market_cap_usd, hr24_volume, hr24_change)
VALUES ($1, $2, $3, $4, $5, $6);
";

const RAW_RANGE: &str = r"
SELECT asset_id, observed_at, price_usd, market_cap_usd, hr24_volume, hr24_change
FROM {raw}
WHERE asset_id = $1 AND observed_at BETWEEN $2 AND $3
ORDER BY observed_at ASC, id ASC;
";

const RAW_LATEST: &str = r"
SELECT asset_id, observed_at, price_usd, market_cap_usd, hr24_volume, hr24_change
FROM {raw}
WHERE asset_id = $1 AND observed_at <= $2
ORDER BY observed_at DESC, id DESC
LIMIT 1;
";

/// Row shape of the aggregate table
#[derive(QueryableByName, Debug)]
struct BucketAggregateRow {
    #[diesel(sql_type = Text)]
    asset_id: String,
    #[diesel(sql_type = BigInt)]
    bucket_start: i64,
    #[diesel(sql_type = Numeric)]
    price_sum: BigDecimal,
    #[diesel(sql_type = BigInt)]
    price_count: i64,
    #[diesel(sql_type = Nullable<Numeric>)]
    moving_avg: Option<BigDecimal>,
    #[diesel(sql_type = Nullable<Numeric>)]
    min_price: Option<BigDecimal>,
    #[diesel(sql_type = Nullable<Numeric>)]
    max_price: Option<BigDecimal>,
    #[diesel(sql_type = Nullable<Text>)]
    signal: Option<String>,
    #[diesel(sql_type = Nullable<Numeric>)]
    pct_change: Option<BigDecimal>,
}

impl TryFrom<BucketAggregateRow> for BucketAggregate {
    type Error = IngestError;

    fn try_from(row: BucketAggregateRow) -> Result<Self, Self::Error> {
        let signal = row
            .signal
            .as_deref()
            .map(crate::aggregators::signal::Signal::from_str)
            .transpose()
            .map_err(IngestError::storage)?;

        Ok(BucketAggregate {
            asset_id: row.asset_id,
            bucket_start: row.bucket_start,
            sum: row.price_sum,
            count: row.price_count,
            moving_avg: row.moving_avg,
            min_price: row.min_price,
            max_price: row.max_price,
            signal,
            pct_change: row.pct_change,
        })
    }
}

/// Postgres-backed raw and aggregate tables sharing one connection pool.
///
/// Table names come from configuration and are validated as plain identifiers
/// before being spliced into the statements above.
#[derive(Clone)]
pub struct PgPriceStore {
    pool: DbPool,
    raw_table: String,
    agg_table: String,
}

impl PgPriceStore {
    pub fn new(pool: DbPool, config: &StoreConfig) -> IngestResult<Self> {
        config.validate()?;

        Ok(Self {
            pool,
            raw_table: config.raw_table.clone(),
            agg_table: config.agg_table.clone(),
        })
    }

    pub fn connect(database_url: &str, config: &StoreConfig) -> IngestResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .build(manager)
            .map_err(|e| IngestError::storage(e.to_string()))?;

        Self::new(pool, config)
    }

    fn sql(&self, template: &str) -> String {
        template
            .replace("{raw}", &self.raw_table)
            .replace("{agg}", &self.agg_table)
    }

    /// Creates both tables and the raw index when missing
    pub fn ensure_tables(&self) -> IngestResult<()> {
        let mut conn = get_conn(&self.pool)?;

        for statement in [CREATE_RAW_TABLE, CREATE_RAW_INDEX, CREATE_AGG_TABLE] {
            diesel::sql_query(self.sql(statement)).execute(&mut conn)?;
        }

        tracing::info!(
            raw_table = %self.raw_table,
            agg_table = %self.agg_table,
            "price tables ready"
        );
        Ok(())
    }
}

impl AggregateStore for PgPriceStore {
    fn accumulate(&self, asset_id: &str, bucket_start: i64, price: &BigDecimal) -> IngestResult<()> {
        let mut conn = get_conn(&self.pool)?;

        diesel::sql_query(self.sql(ACCUMULATE))
            .bind::<Text, _>(asset_id)
            .bind::<BigInt, _>(bucket_start)
            .bind::<Numeric, _>(price)
            .execute(&mut conn)?;

        Ok(())
    }

    fn write_window_result(
        &self,
        asset_id: &str,
        bucket_start: i64,
        result: &WindowResult,
    ) -> IngestResult<()> {
        let mut conn = get_conn(&self.pool)?;

        let rows = diesel::sql_query(self.sql(WRITE_WINDOW_RESULT))
            .bind::<Text, _>(asset_id)
            .bind::<BigInt, _>(bucket_start)
            .bind::<Nullable<Numeric>, _>(result.stat.avg.as_ref())
            .bind::<Nullable<Numeric>, _>(result.stat.min.as_ref())
            .bind::<Nullable<Numeric>, _>(result.stat.max.as_ref())
            .bind::<Nullable<Text>, _>(Some(result.signal.as_str()))
            .bind::<Nullable<Numeric>, _>(result.pct_change.as_ref())
            .execute(&mut conn)?;

        if rows == 0 {
            return Err(IngestError::storage(format!(
                "no aggregate for asset {} at bucket {}",
                asset_id, bucket_start
            )));
        }

        Ok(())
    }

    fn query_range(
        &self,
        asset_id: &str,
        from_bucket: i64,
        to_bucket: i64,
    ) -> IngestResult<Vec<BucketAggregate>> {
        let mut conn = get_conn(&self.pool)?;

        let rows = diesel::sql_query(self.sql(AGG_RANGE))
            .bind::<Text, _>(asset_id)
            .bind::<BigInt, _>(from_bucket)
            .bind::<BigInt, _>(to_bucket)
            .get_results::<BucketAggregateRow>(&mut conn)?;

        rows.into_iter().map(BucketAggregate::try_from).collect()
    }
}

impl RawEventStore for PgPriceStore {
    fn append(&self, record: &RawRecord) -> IngestResult<()> {
        let mut conn = get_conn(&self.pool)?;

        diesel::sql_query(self.sql(RAW_INSERT))
            .bind::<Text, _>(&record.asset_id)
            .bind::<BigInt, _>(record.observed_at)
            .bind::<Numeric, _>(&record.price_usd)
            .bind::<Nullable<Numeric>, _>(record.market_cap_usd.as_ref())
            .bind::<Nullable<Numeric>, _>(record.hr24_volume.as_ref())
            .bind::<Nullable<Numeric>, _>(record.hr24_change.as_ref())
            .execute(&mut conn)?;

        Ok(())
    }

    fn query_range(&self, asset_id: &str, from_ts: i64, to_ts: i64) -> IngestResult<Vec<RawRecord>> {
        let mut conn = get_conn(&self.pool)?;

        let records = diesel::sql_query(self.sql(RAW_RANGE))
            .bind::<Text, _>(asset_id)
            .bind::<BigInt, _>(from_ts)
            .bind::<BigInt, _>(to_ts)
            .get_results::<RawRecord>(&mut conn)?;

        Ok(records)
    }

    fn latest(&self, asset_id: &str, at: i64) -> IngestResult<Option<RawRecord>> {
        let mut conn = get_conn(&self.pool)?;

        let record = diesel::sql_query(self.sql(RAW_LATEST))
            .bind::<Text, _>(asset_id)
            .bind::<BigInt, _>(at)
            .get_result::<RawRecord>(&mut conn)
            .optional()?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_use_configured_tables() {
        let sql = ACCUMULATE
            .replace("{raw}", "crypto_raw")
            .replace("{agg}", "crypto_agg");
        assert!(sql.contains("INSERT INTO crypto_agg"));
        assert!(sql.contains("crypto_agg.price_count + 1"));
        assert!(!sql.contains('{'));
    }

    #[test]
    fn test_row_with_unknown_signal_is_rejected() {
        let row = BucketAggregateRow {
            asset_id: "bitcoin".to_string(),
            bucket_start: 0,
            price_sum: BigDecimal::from(1),
            price_count: 1,
            moving_avg: None,
            min_price: None,
            max_price: None,
            signal: Some("BUY".to_string()),
            pct_change: None,
        };
        assert!(BucketAggregate::try_from(row).is_err());
    }
}
