//! Line scanning and batching for the IO thread.
//!
//! Reads the source file line by line, discards the header row, and groups
//! the remaining lines into fixed-size batches for the parse pool.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;

use crate::error::{EngineError, Result};
use crate::platform::CancelToken;

use super::types::Batch;

/// Line reader over a delimited file whose first line is a header.
///
/// Each scanner reads its input once from the top; a new load opens a new
/// scanner.
pub struct LineScanner<R> {
    reader: R,
    path: PathBuf,
    header: String,
    line_num: usize,
    buffer: Vec<u8>,
}

impl LineScanner<BufReader<File>> {
    /// Open `path` with a read buffer of `buffer_bytes` and consume its header.
    pub fn open(path: &Path, buffer_bytes: usize) -> Result<Self> {
        let file = File::open(path).map_err(|source| EngineError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::with_capacity(buffer_bytes, file), path)
    }
}

impl<R: BufRead> LineScanner<R> {
    /// Wrap a reader and consume its header. Fails with `EmptyInput` when
    /// there is not even a header line.
    pub fn from_reader(reader: R, path: &Path) -> Result<Self> {
        let mut scanner = Self {
            reader,
            path: path.to_path_buf(),
            header: String::new(),
            line_num: 0,
            buffer: Vec::with_capacity(4096),
        };

        match scanner.next_line()? {
            Some(header) => scanner.header = header,
            None => {
                return Err(EngineError::EmptyInput {
                    path: path.to_path_buf(),
                })
            }
        }

        Ok(scanner)
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Number of lines consumed so far, header included
    pub fn line_num(&self) -> usize {
        self.line_num
    }

    /// Next raw line without its terminator. Invalid UTF-8 is replaced
    /// rather than failing the scan.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        self.buffer.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buffer)
            .map_err(|source| EngineError::Scan {
                path: self.path.clone(),
                source,
            })?;

        if read == 0 {
            return Ok(None);
        }

        self.line_num += 1;
        let mut end = self.buffer.len();
        if end > 0 && self.buffer[end - 1] == b'\n' {
            end -= 1;
        }
        if end > 0 && self.buffer[end - 1] == b'\r' {
            end -= 1;
        }
        Ok(Some(String::from_utf8_lossy(&self.buffer[..end]).into_owned()))
    }

    /// Up to `batch_size` lines; `None` once the input is exhausted. The
    /// final batch may be shorter.
    pub fn next_batch(&mut self, batch_id: u64, batch_size: usize) -> Result<Option<Batch>> {
        let start_line_num = self.line_num + 1;
        let mut lines = Vec::with_capacity(batch_size);

        while lines.len() < batch_size {
            match self.next_line()? {
                Some(line) => lines.push(line),
                None => break,
            }
        }

        if lines.is_empty() {
            return Ok(None);
        }

        Ok(Some(Batch {
            id: batch_id,
            lines,
            start_line_num,
        }))
    }
}

/// IO reader thread - scans batches and hands them to the reducer.
///
/// Stops early when the token is cancelled or the receiving side hangs up;
/// the reducer reports those conditions itself.
pub(crate) fn batcher_thread<R: BufRead>(
    mut scanner: LineScanner<R>,
    batch_size: usize,
    batch_sender: Sender<Batch>,
    cancel: CancelToken,
) -> Result<()> {
    let mut batch_id = 0u64;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match scanner.next_batch(batch_id, batch_size)? {
            Some(batch) => {
                if batch_sender.send(batch).is_err() {
                    break;
                }
                batch_id += 1;
            }
            None => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scanner(input: &str) -> Result<LineScanner<Cursor<Vec<u8>>>> {
        LineScanner::from_reader(
            Cursor::new(input.as_bytes().to_vec()),
            Path::new("input.csv"),
        )
    }

    #[test]
    fn test_empty_input_has_no_header() {
        match scanner("") {
            Err(EngineError::EmptyInput { path }) => assert_eq!(path, PathBuf::from("input.csv")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected EmptyInput"),
        }
    }

    #[test]
    fn test_header_is_skipped() {
        let mut s = scanner("id,date\nrow1\nrow2\n").unwrap();
        assert_eq!(s.header(), "id,date");
        assert_eq!(s.next_line().unwrap().as_deref(), Some("row1"));
        assert_eq!(s.next_line().unwrap().as_deref(), Some("row2"));
        assert_eq!(s.next_line().unwrap(), None);
    }

    #[test]
    fn test_header_only_yields_no_batches() {
        let mut s = scanner("id,date\n").unwrap();
        assert!(s.next_batch(0, 10).unwrap().is_none());
    }

    #[test]
    fn test_batches_keep_final_partial_batch() {
        let mut input = String::from("header\n");
        for i in 0..7 {
            input.push_str(&format!("line{}\n", i));
        }
        let mut s = scanner(&input).unwrap();

        let first = s.next_batch(0, 3).unwrap().unwrap();
        assert_eq!(first.lines, vec!["line0", "line1", "line2"]);
        assert_eq!(first.start_line_num, 2);

        let second = s.next_batch(1, 3).unwrap().unwrap();
        assert_eq!(second.start_line_num, 5);

        let last = s.next_batch(2, 3).unwrap().unwrap();
        assert_eq!(last.lines, vec!["line6"]);
        assert!(s.next_batch(3, 3).unwrap().is_none());
    }

    #[test]
    fn test_crlf_and_missing_trailing_newline() {
        let mut s = scanner("h\r\na\r\nb").unwrap();
        assert_eq!(s.header(), "h");
        assert_eq!(s.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(s.next_line().unwrap().as_deref(), Some("b"));
        assert_eq!(s.line_num(), 3);
    }

    #[test]
    fn test_long_line_is_read_whole() {
        let long = "x".repeat(3 * 1024 * 1024);
        let mut s = scanner(&format!("h\n{}\n", long)).unwrap();
        assert_eq!(s.next_line().unwrap().map(|l| l.len()), Some(long.len()));
    }

    #[test]
    fn test_batcher_thread_sends_all_batches() {
        let s = scanner("h\n1\n2\n3\n4\n5\n").unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        batcher_thread(s, 2, tx, CancelToken::new()).unwrap();
        let sizes: Vec<usize> = rx.iter().map(|b| b.lines.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_batcher_thread_stops_when_cancelled() {
        let s = scanner("h\n1\n2\n").unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = CancelToken::new();
        cancel.cancel();
        batcher_thread(s, 1, tx, cancel).unwrap();
        assert_eq!(rx.iter().count(), 0);
    }
}
