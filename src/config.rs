use std::path::PathBuf;

use crate::error::EngineError;

/// Lines per batch handed to the parse pool.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
/// Concurrent parse tasks per batch.
pub const DEFAULT_WORKERS: usize = 10;
/// Initial capacity of the line reader buffer.
pub const DEFAULT_READ_BUFFER_BYTES: usize = 1024 * 1024;
pub const DEFAULT_CACHE_DIR: &str = ".cache";

/// Main configuration struct for the analytics engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub batch_size: usize,
    /// Parse workers per batch; `0` means one per CPU.
    pub workers: usize,
    pub read_buffer_bytes: usize,
    pub delimiter: u8,
    pub cache: CacheConfig,
}

/// Snapshot cache configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            delimiter: b',',
            cache: CacheConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache.dir = dir.into();
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }

    /// Worker count with `0` resolved to the CPU count
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.read_buffer_bytes == 0 {
            return Err(EngineError::InvalidConfig(
                "read buffer must be at least 1 byte".to_string(),
            ));
        }
        if matches!(self.delimiter, b'"' | b'\n' | b'\r') {
            return Err(EngineError::InvalidConfig(format!(
                "unusable field delimiter {:?}",
                self.delimiter as char
            )));
        }
        if self.cache.enabled && self.cache.dir.as_os_str().is_empty() {
            return Err(EngineError::InvalidConfig(
                "cache directory cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.batch_size, 10_000);
        assert_eq!(config.workers, 10);
        assert_eq!(config.read_buffer_bytes, 1024 * 1024);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.dir, PathBuf::from(".cache"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_means_cpu_count() {
        let config = EngineConfig::default().with_workers(0);
        assert!(config.effective_workers() >= 1);
        assert_eq!(EngineConfig::default().with_workers(3).effective_workers(), 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(EngineConfig::default().with_batch_size(0).validate().is_err());
        assert!(EngineConfig::default().with_delimiter(b'"').validate().is_err());
        assert!(EngineConfig::default()
            .with_cache_dir("")
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .with_cache_dir("")
            .without_cache()
            .validate()
            .is_ok());
    }
}
