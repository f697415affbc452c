//! Bounded parse pool for one ingestion pass.
//!
//! The pool's worker threads are started once per pass inside the caller's
//! thread scope and live until [`ParsePool::finish`]. Each batch is split
//! into chunks that the workers pull from a shared bounded queue; results
//! are reassembled in line order before the batch is handed back.

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{Scope, ScopedJoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use crate::error::{EngineError, Result};
use crate::parsers::TransactionParser;
use crate::platform::CancelToken;

use super::types::{Batch, ParsedBatch, ParsedLine};

/// Chunks queued per worker; smaller chunks balance better, larger ones
/// cost less channel traffic.
const CHUNKS_PER_WORKER: usize = 4;

/// A slice of one batch's lines, shared with the batch rather than copied
struct Chunk {
    batch_id: u64,
    index: usize,
    lines: Arc<Vec<String>>,
    range: Range<usize>,
}

struct ChunkResult {
    index: usize,
    rows: Result<Vec<ParsedLine>>,
}

/// Fixed-width pool of parse workers bound to a thread scope
pub struct ParsePool<'scope> {
    workers: usize,
    work_sender: Sender<Chunk>,
    result_receiver: Receiver<ChunkResult>,
    handles: Vec<ScopedJoinHandle<'scope, ()>>,
}

impl<'scope> ParsePool<'scope> {
    /// Spawn `workers` parse threads (at least one) on `scope`.
    pub fn start<'env>(
        scope: &'scope Scope<'scope, 'env>,
        workers: usize,
        delimiter: u8,
        cancel: &CancelToken,
    ) -> Self {
        let workers = workers.max(1);
        let (work_sender, work_receiver) = bounded::<Chunk>(workers);
        let (result_sender, result_receiver) = unbounded::<ChunkResult>();

        let handles = (0..workers)
            .map(|worker_id| {
                let work_receiver = work_receiver.clone();
                let result_sender = result_sender.clone();
                let cancel = cancel.clone();
                scope.spawn(move || {
                    worker_thread(worker_id, work_receiver, result_sender, delimiter, cancel)
                })
            })
            .collect();

        Self {
            workers,
            work_sender,
            result_receiver,
            handles,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Parse every line of `batch`. Never more than `workers` lines are being
    /// parsed at once, whatever the batch size.
    pub fn parse_batch(&self, batch: Batch) -> Result<ParsedBatch> {
        let Batch {
            id,
            lines,
            start_line_num,
        } = batch;
        let total = lines.len();
        let chunk_len = total.div_ceil(self.workers * CHUNKS_PER_WORKER).max(1);
        let chunk_count = total.div_ceil(chunk_len);
        let lines = Arc::new(lines);

        for index in 0..chunk_count {
            let start = index * chunk_len;
            let chunk = Chunk {
                batch_id: id,
                index,
                lines: Arc::clone(&lines),
                range: start..(start + chunk_len).min(total),
            };
            if self.work_sender.send(chunk).is_err() {
                return Err(EngineError::WorkerPanicked { batch_id: id });
            }
        }

        // Every chunk of this batch is received, even after a failure, so
        // nothing stale is left queued for the next batch.
        let mut slots: Vec<Option<Result<Vec<ParsedLine>>>> = Vec::with_capacity(chunk_count);
        slots.resize_with(chunk_count, || None);
        for _ in 0..chunk_count {
            match self.result_receiver.recv() {
                Ok(result) => slots[result.index] = Some(result.rows),
                Err(_) => return Err(EngineError::WorkerPanicked { batch_id: id }),
            }
        }

        let mut rows = Vec::with_capacity(total);
        for slot in slots {
            match slot {
                Some(chunk_rows) => rows.extend(chunk_rows?),
                None => return Err(EngineError::WorkerPanicked { batch_id: id }),
            }
        }

        Ok(ParsedBatch {
            batch_id: id,
            start_line_num,
            rows,
        })
    }

    /// Close the work queue and wait for every worker to exit.
    pub fn finish(self) {
        let ParsePool {
            work_sender,
            handles,
            ..
        } = self;
        drop(work_sender);

        for handle in handles {
            if let Err(panic) = handle.join() {
                panic::resume_unwind(panic);
            }
        }
    }
}

/// Worker thread: parses chunks until the queue closes
fn worker_thread(
    worker_id: usize,
    work_receiver: Receiver<Chunk>,
    result_sender: Sender<ChunkResult>,
    delimiter: u8,
    cancel: CancelToken,
) {
    let mut parser = TransactionParser::with_delimiter(delimiter);

    for chunk in work_receiver.iter() {
        let Chunk {
            batch_id,
            index,
            lines,
            range,
        } = chunk;

        let parsed = panic::catch_unwind(AssertUnwindSafe(|| {
            parse_chunk(&mut parser, &lines[range], &cancel)
        }));
        let rows = match parsed {
            Ok(rows) => rows,
            Err(_) => {
                log::error!("parse worker {} panicked on batch {}", worker_id, batch_id);
                parser = TransactionParser::with_delimiter(delimiter);
                Err(EngineError::WorkerPanicked { batch_id })
            }
        };

        if result_sender.send(ChunkResult { index, rows }).is_err() {
            break;
        }
    }
}

fn parse_chunk(
    parser: &mut TransactionParser,
    lines: &[String],
    cancel: &CancelToken,
) -> Result<Vec<ParsedLine>> {
    let mut rows = Vec::with_capacity(lines.len());
    for line in lines {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        rows.push(parser.parse(line));
    }
    Ok(rows)
}
