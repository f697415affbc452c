// Core library for the salescope analytics engine

pub mod aggregate;
pub mod analytics;
pub mod cache;
pub mod cli;
pub mod config;
pub mod config_file;
pub mod error;
pub mod model;
pub mod parallel;
pub mod parsers;
pub mod platform;
pub mod report;
pub mod rollup;
pub mod stats;

pub use analytics::{Analytics, LoadReport, LoadSource, Rows, SnapshotStats};
pub use cache::SnapshotCache;
pub use config::{CacheConfig, EngineConfig};
pub use error::{CacheError, EngineError, Result, RowError};
pub use model::{CountryRevenue, MonthlyData, ProductFrequency, RegionRevenue, Transaction};
pub use parsers::TransactionParser;
pub use platform::CancelToken;
pub use rollup::{top_n, PrecomputedData};
pub use stats::IngestStats;
