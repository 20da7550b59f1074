// Public library interface for price-signal-back-end
pub mod action_router;
pub mod aggregators;
pub mod api;
pub mod cli_utils;
pub mod errors;
pub mod ingest;
pub mod price_store;
pub mod utils;
