use std::time::{Duration, Instant};

use serde::Serialize;

/// Statistics collected while ingesting one source file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    pub lines_read: u64,
    pub records_valid: u64,
    pub records_discarded: u64,
    pub batches: u64,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    #[serde(skip)]
    pub start_time: Option<Instant>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Account for one parsed batch.
    pub fn add_batch(&mut self, lines: u64, valid: u64) {
        self.batches += 1;
        self.lines_read += lines;
        self.records_valid += valid;
        self.records_discarded += lines - valid;
    }

    pub fn finish(&mut self) {
        if let Some(start) = self.start_time {
            self.elapsed = start.elapsed();
        }
    }

    pub fn records_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.records_valid as f64 / secs
        } else {
            0.0
        }
    }

    pub fn format_stats(&self) -> String {
        let mut output = format!(
            "Lines processed: {} total, {} valid, {} discarded",
            self.lines_read, self.records_valid, self.records_discarded
        );

        if self.batches > 0 {
            output.push_str(&format!(", {} batches", self.batches));
        }

        let processing_time_ms = self.elapsed.as_millis();
        output.push_str(&format!(" in {}ms", processing_time_ms));

        if processing_time_ms > 0 && self.records_valid > 0 {
            output.push_str(&format!(" ({:.0} records/s)", self.records_per_sec()));
        }

        output
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
