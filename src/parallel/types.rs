//! Type definitions shared by the parallel ingestion stages.
//!
//! Contains data structures for batches, parse results, and configuration.

use crate::config::EngineConfig;
use crate::error::RowError;
use crate::model::Transaction;
use crate::rollup::PrecomputedData;
use crate::stats::IngestStats;

/// Configuration for parallel ingestion
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    pub num_workers: usize,
    pub batch_size: usize,
    pub read_buffer_bytes: usize,
    pub delimiter: u8,
    /// Batches the reader may run ahead of the reducer.
    pub batch_queue: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        ParallelConfig::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ParallelConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            num_workers: config.effective_workers(),
            batch_size: config.batch_size,
            read_buffer_bytes: config.read_buffer_bytes,
            delimiter: config.delimiter,
            batch_queue: 2,
        }
    }
}

/// A batch of lines to be processed together
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: u64,
    pub lines: Vec<String>,
    /// 1-based line number of the first line, counting the header
    pub start_line_num: usize,
}

/// Parse outcome for one line
pub type ParsedLine = Result<Transaction, RowError>;

/// Result of parsing a batch; `rows` follows the batch's line order
#[derive(Debug)]
pub struct ParsedBatch {
    pub batch_id: u64,
    pub start_line_num: usize,
    pub rows: Vec<ParsedLine>,
}

impl ParsedBatch {
    pub fn valid(&self) -> impl Iterator<Item = &Transaction> {
        self.rows.iter().filter_map(|row| row.as_ref().ok())
    }

    pub fn valid_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_ok()).count()
    }

    /// Rejected rows with their 1-based source line numbers
    pub fn rejected(&self) -> impl Iterator<Item = (usize, RowError)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter_map(move |(offset, row)| match row {
                Ok(_) => None,
                Err(err) => Some((self.start_line_num + offset, *err)),
            })
    }
}

/// Output of a complete ingestion pass
#[derive(Debug)]
pub struct IngestOutcome {
    pub data: PrecomputedData,
    pub stats: IngestStats,
}
