//! Parallel ingestion of a transaction file into global rollup maps.
//!
//! Lines are scanned into batches, parsed on a bounded worker pool, and
//! merged batch by batch in file order.
//!
//! # Module Structure
//!
//! - `types`: Data structures for batches, parse results, and configuration
//! - `batching`: Line scanner and the IO reader thread
//! - `worker`: Bounded parse pool started once per pass
//! - `tracker`: Global aggregate maps and per-batch merge
//! - `processor`: Main ParallelProcessor orchestration

mod batching;
mod processor;
mod tracker;
mod types;
mod worker;

// Re-export public types
pub use batching::LineScanner;
pub use processor::ParallelProcessor;
pub use tracker::GlobalTracker;
pub use types::{Batch, IngestOutcome, ParallelConfig, ParsedBatch, ParsedLine};
pub use worker::ParsePool;
