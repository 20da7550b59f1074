pub mod config;
pub mod db_types;
pub mod memory;
pub mod operations;
pub mod sql_queries;

pub use config::StoreConfig;
pub use db_types::{BucketAggregate, PriceEvent, RawRecord, WindowResult};
pub use memory::{MemoryAggregateStore, MemoryRawEventStore};
pub use operations::{AggregateStore, RawEventStore};
pub use sql_queries::PgPriceStore;
