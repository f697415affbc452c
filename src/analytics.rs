//! Read model and query interface.
//!
//! [`Analytics`] publishes one immutable [`PrecomputedData`] at a time behind
//! a reader-writer lock. Loads build a complete new snapshot off to the side
//! and swap it in with a single write; the lock is never held while parsing.
//! Query results are [`Rows`] views that share the snapshot they were read
//! from, so a swap never invalidates data a caller is still holding.

use std::fmt;
use std::io::BufRead;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::aggregate::Aggregates;
use crate::cache::SnapshotCache;
use crate::config::EngineConfig;
use crate::error::{CacheError, Result};
use crate::model::{CountryRevenue, MonthlyData, ProductFrequency, RegionRevenue, Transaction};
use crate::parallel::{IngestOutcome, ParallelConfig, ParallelProcessor};
use crate::platform::CancelToken;
use crate::rollup::{top_n, PrecomputedData};
use crate::stats::IngestStats;

/// Where a successful load got its snapshot from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    Cache,
    Computed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub source: LoadSource,
    pub records: u64,
    /// Ingestion statistics; absent when the snapshot came from the cache
    pub stats: Option<IngestStats>,
}

/// Summary of the current snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotStats {
    pub record_count: u64,
    pub last_processed: DateTime<Utc>,
    pub countries: usize,
    pub products: usize,
    pub months: usize,
    pub regions: usize,
}

/// Zero-copy view of one rollup collection of a snapshot.
///
/// Dereferences to a slice. Holding a `Rows` keeps its snapshot alive even
/// after a newer one has been installed.
pub struct Rows<T> {
    snapshot: Arc<PrecomputedData>,
    select: fn(&PrecomputedData) -> &[T],
    len: usize,
}

impl<T> Rows<T> {
    fn new(snapshot: Arc<PrecomputedData>, select: fn(&PrecomputedData) -> &[T], limit: usize) -> Self {
        let len = top_n(select(&snapshot), limit).len();
        Self {
            snapshot,
            select,
            len,
        }
    }

    /// The snapshot these rows were read from
    pub fn snapshot(&self) -> &Arc<PrecomputedData> {
        &self.snapshot
    }
}

impl<T> Deref for Rows<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &(self.select)(&self.snapshot)[..self.len]
    }
}

impl<T> Clone for Rows<T> {
    fn clone(&self) -> Self {
        Self {
            snapshot: Arc::clone(&self.snapshot),
            select: self.select,
            len: self.len,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Rows<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Serialize> Serialize for Rows<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'a, T> IntoIterator for &'a Rows<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn country_rows(data: &PrecomputedData) -> &[CountryRevenue] {
    &data.country_revenue
}

fn product_rows(data: &PrecomputedData) -> &[ProductFrequency] {
    &data.top_products
}

fn month_rows(data: &PrecomputedData) -> &[MonthlyData] {
    &data.monthly_sales
}

fn region_rows(data: &PrecomputedData) -> &[RegionRevenue] {
    &data.top_regions
}

/// The analytics engine
pub struct Analytics {
    snapshot: RwLock<Arc<PrecomputedData>>,
    config: EngineConfig,
    cache: Option<SnapshotCache>,
    source_path: RwLock<Option<PathBuf>>,
    records_processed: AtomicU64,
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new()
    }
}

impl Analytics {
    /// Engine with the default configuration and an empty snapshot
    pub fn new() -> Self {
        Self::build(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| SnapshotCache::new(config.cache.dir.clone()));
        Self {
            snapshot: RwLock::new(Arc::new(PrecomputedData::empty())),
            config,
            cache,
            source_path: RwLock::new(None),
            records_processed: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&SnapshotCache> {
        self.cache.as_ref()
    }

    /// Compute the rollups of an in-memory collection and install them.
    ///
    /// Same aggregation and ordering as a file load, without scanning,
    /// parsing or caching. An empty collection installs an empty snapshot.
    pub fn set_data(&self, data: &[Transaction]) {
        let aggregates = Aggregates::from_transactions(data);
        let snapshot = PrecomputedData::finalize(aggregates, Utc::now());
        self.records_processed
            .store(snapshot.record_count, Ordering::Relaxed);
        self.install(Arc::new(snapshot));
    }

    /// Load `path`, from the snapshot cache when it is fresh, otherwise by
    /// streaming the file through the parallel pipeline.
    ///
    /// On any error the previously installed snapshot stays in place.
    pub fn load_from_csv(&self, path: impl AsRef<Path>, cancel: &CancelToken) -> Result<LoadReport> {
        let path = path.as_ref();
        *write_lock(&self.source_path) = Some(path.to_path_buf());

        if let Some(report) = self.try_cache(path) {
            return Ok(report);
        }

        log::info!("processing CSV file {}", path.display());
        let processor = ParallelProcessor::new(ParallelConfig::from(&self.config));
        let outcome = processor.process(path, cancel)?;
        let (snapshot, report) = self.install_computed(outcome);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(path, &snapshot) {
                log::warn!("failed to save cache for {}: {}", path.display(), error_chain(&e));
            }
        }

        Ok(report)
    }

    /// Load from an already open reader whose first line is the header.
    ///
    /// Always computed; the snapshot cache is neither read nor written since
    /// a stream has no modification time. `source` only names the input in
    /// errors and logs. On any error the previous snapshot stays in place.
    pub fn load_from_reader<R: BufRead + Send>(
        &self,
        reader: R,
        source: &Path,
        cancel: &CancelToken,
    ) -> Result<LoadReport> {
        log::info!("processing CSV stream {}", source.display());
        let processor = ParallelProcessor::new(ParallelConfig::from(&self.config));
        let outcome = processor.process_reader(reader, source, cancel)?;
        Ok(self.install_computed(outcome).1)
    }

    fn install_computed(&self, outcome: IngestOutcome) -> (Arc<PrecomputedData>, LoadReport) {
        let snapshot = Arc::new(outcome.data);
        let records = snapshot.record_count;
        self.install(Arc::clone(&snapshot));
        self.records_processed.store(records, Ordering::Relaxed);

        let stats = outcome.stats;
        log::info!(
            "csv processing complete: {} records, {} discarded, {:?} ({:.0} records/sec)",
            records,
            stats.records_discarded,
            stats.elapsed,
            stats.records_per_sec()
        );

        let report = LoadReport {
            source: LoadSource::Computed,
            records,
            stats: Some(stats),
        };
        (snapshot, report)
    }

    fn try_cache(&self, path: &Path) -> Option<LoadReport> {
        let cache = self.cache.as_ref()?;
        match cache.load_fresh(path) {
            Ok(Some(snapshot)) => {
                let records = snapshot.record_count;
                self.install(Arc::new(snapshot));
                self.records_processed.store(records, Ordering::Relaxed);
                log::info!("loaded from cache: {} records", records);
                Some(LoadReport {
                    source: LoadSource::Cache,
                    records,
                    stats: None,
                })
            }
            Ok(None) => {
                log::info!("cache for {} is stale, recomputing", path.display());
                None
            }
            Err(e) => {
                log::debug!("cache miss for {}: {}", path.display(), error_chain(&e));
                None
            }
        }
    }

    fn install(&self, snapshot: Arc<PrecomputedData>) {
        *write_lock(&self.snapshot) = snapshot;
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Arc<PrecomputedData> {
        Arc::clone(&read_lock(&self.snapshot))
    }

    pub fn country_revenue(&self) -> Rows<CountryRevenue> {
        Rows::new(self.snapshot(), country_rows, usize::MAX)
    }

    /// The `limit` most frequently sold products
    pub fn top_products(&self, limit: usize) -> Rows<ProductFrequency> {
        Rows::new(self.snapshot(), product_rows, limit)
    }

    /// Months ranked by sales volume
    pub fn monthly_sales(&self) -> Rows<MonthlyData> {
        Rows::new(self.snapshot(), month_rows, usize::MAX)
    }

    /// The `limit` regions with the highest revenue
    pub fn top_regions(&self, limit: usize) -> Rows<RegionRevenue> {
        Rows::new(self.snapshot(), region_rows, limit)
    }

    pub fn stats(&self) -> SnapshotStats {
        let snapshot = self.snapshot();
        SnapshotStats {
            record_count: snapshot.record_count,
            last_processed: snapshot.last_modified,
            countries: snapshot.country_revenue.len(),
            products: snapshot.top_products.len(),
            months: snapshot.monthly_sales.len(),
            regions: snapshot.top_regions.len(),
        }
    }

    /// Valid records folded in by the most recent successful load
    pub fn records_processed(&self) -> u64 {
        self.records_processed.load(Ordering::Relaxed)
    }

    /// Path of the most recent load attempt
    pub fn source_path(&self) -> Option<PathBuf> {
        read_lock(&self.source_path).clone()
    }
}

/// Lock for reading with poison recovery
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        log::warn!("read model lock poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Lock for writing with poison recovery
fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        log::warn!("read model lock poisoned, recovering");
        poisoned.into_inner()
    })
}

fn error_chain(err: &CacheError) -> String {
    use std::error::Error;

    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
