//! Error types for the analytics engine.
//!
//! `EngineError` is what a load surfaces to callers. `CacheError` never leaves
//! the engine: every cache failure degrades to a recomputation or a logged
//! warning. `RowError` only exists to label and count discarded rows.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("open source file {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("scan source file {}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("empty file {}: no header row", path.display())]
    EmptyInput { path: PathBuf },

    #[error("no valid records found in {}", path.display())]
    NoValidRecords { path: PathBuf },

    #[error("load cancelled")]
    Cancelled,

    #[error("parse worker panicked while processing batch {batch_id}")]
    WorkerPanicked { batch_id: u64 },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// True when the load stopped because its cancel token fired, not because
    /// of the data.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("encode snapshot")]
    Encode(#[source] bitcode::Error),

    #[error("decode snapshot {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: bitcode::Error,
    },

    #[error("cache format version {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("cache belongs to {found}, expected {expected}")]
    SourceMismatch { found: String, expected: String },
}

/// Why a single row was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RowError {
    #[error("row has {found} fields, need at least {required}")]
    MissingFields { found: usize, required: usize },
    #[error("unreadable row")]
    Malformed,
    #[error("bad transaction date")]
    Date,
    #[error("bad unit price")]
    Price,
    #[error("bad quantity")]
    Quantity,
    #[error("bad total price")]
    TotalPrice,
    #[error("bad stock quantity")]
    Stock,
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
