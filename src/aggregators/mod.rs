pub mod time_series;
pub mod aggregation_block;
pub mod processor;
pub mod signal;
pub mod config;

// Re-export commonly used types
pub use aggregation_block::{StatSource, WindowStat};
pub use config::{AggregatorsConfig, WindowSource};
pub use processor::WindowAggregator;
pub use signal::{classify, Classification, Signal};
