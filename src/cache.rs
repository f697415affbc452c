//! Binary snapshot cache.
//!
//! A finalized [`PrecomputedData`] is written as a bitcode blob named after
//! the sanitized source path plus a format-version tag. Bumping the version
//! changes every file name, so old caches are simply never opened again.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::rollup::PrecomputedData;

pub const CACHE_FORMAT_VERSION: u32 = 1;
const CACHE_EXTENSION: &str = "bin";

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    source_path: &'a str,
    data: &'a PrecomputedData,
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u32,
    source_path: String,
    data: PrecomputedData,
}

/// Snapshot cache rooted at one directory
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for `source`: `<dir>/<sanitized path>_v<version>.bin`
    pub fn path_for(&self, source: &Path) -> PathBuf {
        self.dir.join(format!(
            "{}_v{}.{}",
            sanitize(&source.to_string_lossy()),
            CACHE_FORMAT_VERSION,
            CACHE_EXTENSION
        ))
    }

    /// Write `data` for `source`, creating the cache directory if needed.
    /// The file is replaced atomically.
    pub fn save(&self, source: &Path, data: &PrecomputedData) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let source_path = source.to_string_lossy();
        let bytes = bitcode::serialize(&EnvelopeRef {
            format_version: CACHE_FORMAT_VERSION,
            source_path: &source_path,
            data,
        })
        .map_err(CacheError::Encode)?;

        let target = self.path_for(source);
        let staging = target.with_extension(format!("{}.{}.tmp", CACHE_EXTENSION, std::process::id()));
        fs::write(&staging, &bytes).map_err(|e| io_error(&staging, e))?;
        if let Err(e) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(io_error(&target, e));
        }

        log::debug!("wrote {} byte snapshot to {}", bytes.len(), target.display());
        Ok(target)
    }

    /// Read the snapshot stored for `source`, without any staleness check.
    pub fn load(&self, source: &Path) -> Result<PrecomputedData, CacheError> {
        let path = self.path_for(source);
        let bytes = fs::read(&path).map_err(|e| io_error(&path, e))?;

        let envelope: Envelope =
            bitcode::deserialize(&bytes).map_err(|source| CacheError::Decode {
                path: path.clone(),
                source,
            })?;

        if envelope.format_version != CACHE_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                found: envelope.format_version,
                expected: CACHE_FORMAT_VERSION,
            });
        }

        let expected = source.to_string_lossy();
        if envelope.source_path != expected {
            return Err(CacheError::SourceMismatch {
                found: envelope.source_path,
                expected: expected.into_owned(),
            });
        }

        Ok(envelope.data)
    }

    /// Read the snapshot for `source` if the source has not been modified
    /// after the snapshot was produced. `Ok(None)` means stale.
    pub fn load_fresh(&self, source: &Path) -> Result<Option<PrecomputedData>, CacheError> {
        let data = self.load(source)?;
        let modified = fs::metadata(source)
            .and_then(|meta| meta.modified())
            .map_err(|e| io_error(source, e))?;

        if is_fresh(modified, &data) {
            Ok(Some(data))
        } else {
            Ok(None)
        }
    }

    /// Delete the snapshot for `source`. Returns whether a file was removed.
    pub fn remove(&self, source: &Path) -> Result<bool, CacheError> {
        let path = self.path_for(source);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

/// A snapshot is fresh while the source's mtime is not after its stamp.
pub fn is_fresh(source_modified: SystemTime, data: &PrecomputedData) -> bool {
    DateTime::<Utc>::from(source_modified) <= data.last_modified
}

/// Flatten a path into a single file name component.
fn sanitize(path: &str) -> String {
    path.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

fn io_error(path: &Path, source: io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::tx;
    use crate::aggregate::Aggregates;
    use chrono::Duration;
    use tempfile::TempDir;

    fn snapshot() -> PrecomputedData {
        let rows = vec![
            tx((2023, 1, 15), "USA", "North", "Laptop", "Electronics", 999.99, 1, 50),
            tx((2023, 2, 1), "Canada", "North", "Mouse", "Electronics", 29.99, 3, 200),
        ];
        PrecomputedData::finalize(Aggregates::from_transactions(&rows), Utc::now())
    }

    #[test]
    fn test_path_is_sanitized_and_versioned() {
        let cache = SnapshotCache::new(".cache");
        assert_eq!(
            cache.path_for(Path::new("data/sales 2023.csv")),
            PathBuf::from(".cache/data_sales_2023.csv_v1.bin")
        );
        assert_eq!(
            cache.path_for(Path::new("/tmp/x.csv")),
            PathBuf::from(".cache/_tmp_x.csv_v1.bin")
        );
    }

    #[test]
    fn test_save_creates_dir_and_loads_back() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path().join("nested").join("cache"));
        let data = snapshot();

        let written = cache.save(Path::new("sales.csv"), &data).unwrap();
        assert!(written.exists());
        assert_eq!(cache.load(Path::new("sales.csv")).unwrap(), data);
    }

    #[test]
    fn test_missing_and_corrupt_files_are_errors() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());
        assert!(matches!(
            cache.load(Path::new("sales.csv")),
            Err(CacheError::Io { .. })
        ));

        fs::write(cache.path_for(Path::new("sales.csv")), b"not bitcode").unwrap();
        assert!(cache.load(Path::new("sales.csv")).is_err());
    }

    #[test]
    fn test_colliding_names_are_rejected_by_source_path() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());
        cache.save(Path::new("a/b.csv"), &snapshot()).unwrap();
        assert_eq!(
            cache.path_for(Path::new("a/b.csv")),
            cache.path_for(Path::new("a_b.csv"))
        );
        assert!(matches!(
            cache.load(Path::new("a_b.csv")),
            Err(CacheError::SourceMismatch { .. })
        ));
    }

    #[test]
    fn test_is_fresh_compares_mtime_with_stamp() {
        let data = snapshot();
        let stamp: SystemTime = data.last_modified.into();
        assert!(is_fresh(stamp, &data));
        assert!(is_fresh((data.last_modified - Duration::seconds(5)).into(), &data));
        assert!(!is_fresh((data.last_modified + Duration::seconds(5)).into(), &data));
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());
        cache.save(Path::new("sales.csv"), &snapshot()).unwrap();
        assert!(cache.remove(Path::new("sales.csv")).unwrap());
        assert!(!cache.remove(Path::new("sales.csv")).unwrap());
    }
}
