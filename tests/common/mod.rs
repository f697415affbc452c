// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::io::{self, BufRead, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use salescope::CancelToken;
use tempfile::{NamedTempFile, TempDir};

pub const HEADER: &str = "transaction_id,date,user_id,country,region,product_id,product_name,category,price,quantity,total_price,stock,added_date";

/// One well-formed transaction line
pub fn row(
    date: &str,
    country: &str,
    region: &str,
    product: &str,
    category: &str,
    total: f64,
    quantity: i64,
) -> String {
    format!(
        "T-{product}-{date},{date},U1,{country},{region},P-{product},{product},{category},{price},{quantity},{total},25,2022-12-01",
        price = total / quantity.max(1) as f64
    )
}

/// Write a header plus `rows` to a temporary CSV file
pub fn write_csv(rows: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "{}", HEADER).expect("Failed to write header");
    for row in rows {
        writeln!(file, "{}", row).expect("Failed to write row");
    }
    file.flush().expect("Failed to flush temp file");
    file
}

/// In-memory CSV source that cancels `cancel` once `limit` bytes have been
/// consumed, so a load is interrupted part way through its scan.
pub struct CancelAfter {
    inner: Cursor<Vec<u8>>,
    limit: usize,
    consumed: usize,
    cancel: CancelToken,
}

impl CancelAfter {
    /// Header plus `rows`, cancelling after `fraction` of the bytes.
    pub fn new(rows: &[String], fraction: f64, cancel: &CancelToken) -> Self {
        let mut bytes = format!("{}\n", HEADER).into_bytes();
        for row in rows {
            bytes.extend_from_slice(row.as_bytes());
            bytes.push(b'\n');
        }
        Self {
            limit: (bytes.len() as f64 * fraction) as usize,
            inner: Cursor::new(bytes),
            consumed: 0,
            cancel: cancel.clone(),
        }
    }

    fn count(&mut self, amt: usize) {
        self.consumed += amt;
        if self.consumed >= self.limit {
            self.cancel.cancel();
        }
    }
}

impl Read for CancelAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count(n);
        Ok(n)
    }
}

impl BufRead for CancelAfter {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
        self.count(amt);
    }
}

/// Write `rows` under `dir/name` with a header
pub fn write_csv_in(dir: &Path, name: &str, rows: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut content = format!("{}\n", HEADER);
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    std::fs::write(&path, content).expect("Failed to write csv");
    path
}

/// Run the salescope binary inside `workdir` with an isolated HOME and
/// XDG config dir, so no user configuration leaks into the test.
pub fn run_salescope_in(workdir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_salescope"))
        .args(args)
        .current_dir(workdir)
        .env("HOME", workdir)
        .env("XDG_CONFIG_HOME", workdir.join(".config"))
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute salescope");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Run salescope against a fresh temp dir holding `rows` as `sales.csv`
pub fn run_salescope_with_rows(args: &[&str], rows: &[String]) -> (String, String, i32, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write_csv_in(dir.path(), "sales.csv", rows);
    let mut full_args = vec!["sales.csv"];
    full_args.extend_from_slice(args);
    let (stdout, stderr, code) = run_salescope_in(dir.path(), &full_args);
    (stdout, stderr, code, dir)
}
