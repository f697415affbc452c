//! Orchestration of one ingestion pass over a source file.
//!
//! An IO thread scans batches ahead while the calling thread hands each
//! batch to the parse pool, folds the valid rows into batch-local aggregates
//! and merges them into the global tracker in file order.

use std::io::BufRead;
use std::path::Path;
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam_channel::bounded;

use crate::aggregate::Aggregates;
use crate::error::{EngineError, Result};
use crate::platform::CancelToken;
use crate::rollup::PrecomputedData;
use crate::stats::IngestStats;

use super::batching::{batcher_thread, LineScanner};
use super::tracker::GlobalTracker;
use super::types::{Batch, IngestOutcome, ParallelConfig, ParsedBatch};
use super::worker::ParsePool;

/// Main parallel processor
pub struct ParallelProcessor {
    config: ParallelConfig,
    global_tracker: GlobalTracker,
}

impl ParallelProcessor {
    pub fn new(config: ParallelConfig) -> Self {
        Self {
            config,
            global_tracker: GlobalTracker::new(),
        }
    }

    /// Stream `path` into a finalized snapshot.
    ///
    /// Fails with `EmptyInput` when the file has no header, `NoValidRecords`
    /// when no row survives parsing, and `Cancelled` as soon as the token is
    /// seen. Nothing partial is returned on failure.
    pub fn process(&self, path: &Path, cancel: &CancelToken) -> Result<IngestOutcome> {
        let started_at = Utc::now();
        let scanner = LineScanner::open(path, self.config.read_buffer_bytes)?;
        self.run(scanner, path, started_at, cancel)
    }

    /// Like [`process`](Self::process), over an already open reader.
    /// `path` only names the source in errors.
    pub fn process_reader<R: BufRead + Send>(
        &self,
        reader: R,
        path: &Path,
        cancel: &CancelToken,
    ) -> Result<IngestOutcome> {
        let started_at = Utc::now();
        let scanner = LineScanner::from_reader(reader, path)?;
        self.run(scanner, path, started_at, cancel)
    }

    fn run<R: BufRead + Send>(
        &self,
        scanner: LineScanner<R>,
        path: &Path,
        started_at: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<IngestOutcome> {
        let mut stats = IngestStats::new();
        let (batch_sender, batch_receiver) = bounded::<Batch>(self.config.batch_queue.max(1));

        let reduced = thread::scope(|scope| -> Result<()> {
            let io_handle = {
                let batch_size = self.config.batch_size;
                let cancel = cancel.clone();
                scope.spawn(move || batcher_thread(scanner, batch_size, batch_sender, cancel))
            };
            let pool = ParsePool::start(
                scope,
                self.config.num_workers,
                self.config.delimiter,
                cancel,
            );

            let mut outcome = Ok(());
            for batch in batch_receiver.iter() {
                if cancel.is_cancelled() {
                    outcome = Err(EngineError::Cancelled);
                    break;
                }
                match pool.parse_batch(batch) {
                    Ok(parsed) => self.reduce_batch(parsed, &mut stats),
                    Err(err) => {
                        outcome = Err(err);
                        break;
                    }
                }
            }
            // Hang up so a reader blocked on a full queue can finish.
            drop(batch_receiver);
            pool.finish();

            let io_result = io_handle.join().unwrap_or_else(|e| {
                std::panic::resume_unwind(e);
            });
            outcome.and(io_result)
        });

        if reduced.is_err() || cancel.is_cancelled() {
            self.global_tracker.take();
            return Err(reduced.err().unwrap_or(EngineError::Cancelled));
        }

        let aggregates = self.global_tracker.take();
        if aggregates.is_empty() {
            return Err(EngineError::NoValidRecords {
                path: path.to_path_buf(),
            });
        }

        stats.finish();
        Ok(IngestOutcome {
            data: PrecomputedData::finalize(aggregates, started_at),
            stats,
        })
    }

    /// Fold a parsed batch sequentially into local maps, then merge once.
    fn reduce_batch(&self, parsed: ParsedBatch, stats: &mut IngestStats) {
        if log::log_enabled!(log::Level::Trace) {
            for (line_num, err) in parsed.rejected() {
                log::trace!("discarding line {}: {}", line_num, err);
            }
        }

        let local = Aggregates::from_transactions(parsed.valid());
        stats.add_batch(parsed.rows.len() as u64, local.record_count);
        self.global_tracker.merge_batch(local);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read, Write};
    use tempfile::NamedTempFile;

    const HEADER: &str = "transaction_id,date,user_id,country,region,product_id,product_name,category,price,quantity,total_price,stock,added_date";

    fn write_csv(rows: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn row(id: usize, country: &str, product: &str, total: f64) -> String {
        format!(
            "T{id},2023-0{}-15,U{id},{country},Region-{country},P{id},{product},Electronics,{total},1,{total},10,2023-01-01",
            id % 9 + 1
        )
    }

    /// Reader that trips `cancel` once `limit` bytes have been consumed
    struct CancelAfter {
        inner: Cursor<Vec<u8>>,
        limit: usize,
        consumed: usize,
        cancel: CancelToken,
    }

    impl Read for CancelAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.consume_counted(n);
            Ok(n)
        }
    }

    impl BufRead for CancelAfter {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            self.inner.fill_buf()
        }

        fn consume(&mut self, amt: usize) {
            self.inner.consume(amt);
            self.consume_counted(amt);
        }
    }

    impl CancelAfter {
        fn consume_counted(&mut self, amt: usize) {
            self.consumed += amt;
            if self.consumed >= self.limit {
                self.cancel.cancel();
            }
        }
    }

    fn processor(batch_size: usize, workers: usize) -> ParallelProcessor {
        ParallelProcessor::new(ParallelConfig {
            num_workers: workers,
            batch_size,
            ..ParallelConfig::default()
        })
    }

    #[test]
    fn test_batch_size_does_not_change_result() {
        let rows: Vec<String> = (0..257)
            .map(|i| row(i, ["USA", "Canada", "Peru"][i % 3], ["A", "B", "C", "D"][i % 4], 2.0))
            .collect();
        let file = write_csv(&rows);
        let cancel = CancelToken::new();

        let small = processor(10, 3).process(file.path(), &cancel).unwrap();
        let large = processor(10_000, 10).process(file.path(), &cancel).unwrap();

        assert_eq!(small.stats.batches, 26);
        assert_eq!(large.stats.batches, 1);
        assert_eq!(small.data.record_count, 257);
        assert_eq!(small.data.country_revenue, large.data.country_revenue);
        assert_eq!(small.data.top_products, large.data.top_products);
        assert_eq!(small.data.monthly_sales, large.data.monthly_sales);
        assert_eq!(small.data.top_regions, large.data.top_regions);
    }

    #[test]
    fn test_malformed_rows_are_counted_not_fatal() {
        let rows = vec![
            row(1, "USA", "Laptop", 999.99),
            "T2,2023-01-16,U2,USA,R,P2,Mouse,Electronics,not-a-price,1,5,3,2023-01-01".to_string(),
            "short,row".to_string(),
        ];
        let file = write_csv(&rows);
        let outcome = processor(2, 2)
            .process(file.path(), &CancelToken::new())
            .unwrap();

        assert_eq!(outcome.data.record_count, 1);
        assert_eq!(outcome.stats.lines_read, 3);
        assert_eq!(outcome.stats.records_discarded, 2);
    }

    #[test]
    fn test_header_only_is_no_valid_records() {
        let file = write_csv(&[]);
        let err = processor(10, 2)
            .process(file.path(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::NoValidRecords { .. }));
    }

    #[test]
    fn test_all_malformed_is_no_valid_records() {
        let file = write_csv(&["a,b,c".to_string(), "".to_string()]);
        let err = processor(10, 2)
            .process(file.path(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::NoValidRecords { .. }));
    }

    #[test]
    fn test_empty_file_is_empty_input() {
        let file = NamedTempFile::new().unwrap();
        let err = processor(10, 2)
            .process(file.path(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyInput { .. }));
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let err = processor(10, 2)
            .process(Path::new("/nonexistent/salescope/data.csv"), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Open { .. }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let rows: Vec<String> = (0..50).map(|i| row(i, "USA", "A", 1.0)).collect();
        let file = write_csv(&rows);
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = processor(5, 2).process(file.path(), &cancel).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_snapshot_stamped_before_scan() {
        let file = write_csv(&[row(1, "USA", "A", 1.0)]);
        let before = Utc::now();
        let outcome = processor(10, 1)
            .process(file.path(), &CancelToken::new())
            .unwrap();
        assert!(outcome.data.last_modified >= before);
        assert!(outcome.data.last_modified <= Utc::now());
    }

    #[test]
    fn test_cancelled_part_way_through_the_scan() {
        let rows: Vec<String> = (0..1000).map(|i| row(i, "USA", "A", 1.0)).collect();
        let mut bytes = format!("{}\n", HEADER).into_bytes();
        for row in &rows {
            bytes.extend_from_slice(row.as_bytes());
            bytes.push(b'\n');
        }
        let cancel = CancelToken::new();
        let reader = CancelAfter {
            limit: bytes.len() / 2,
            inner: Cursor::new(bytes),
            consumed: 0,
            cancel: cancel.clone(),
        };

        let processor = processor(10, 4);
        let err = processor
            .process_reader(reader, Path::new("sales.csv"), &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(cancel.is_cancelled());
        assert_eq!(processor.global_tracker.record_count(), 0);
    }

    #[test]
    fn test_process_reader_matches_process() {
        let rows: Vec<String> = (0..40).map(|i| row(i, "Peru", "B", 3.0)).collect();
        let file = write_csv(&rows);
        let bytes = std::fs::read(file.path()).unwrap();
        let cancel = CancelToken::new();

        let from_file = processor(7, 2).process(file.path(), &cancel).unwrap();
        let from_reader = processor(7, 2)
            .process_reader(Cursor::new(bytes), file.path(), &cancel)
            .unwrap();
        assert_eq!(from_file.data.country_revenue, from_reader.data.country_revenue);
        assert_eq!(from_file.stats.batches, from_reader.stats.batches);
    }
}
