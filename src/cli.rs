// CLI structure and the mapping from flags onto engine configuration

use std::path::PathBuf;

use clap::Parser;

use crate::config::EngineConfig;
use crate::report::{OutputFormat, ReportOptions, Section};

#[derive(Parser, Debug)]
#[command(name = "salescope")]
#[command(about = "Precompute and query sales rollups from a transaction CSV")]
#[command(
    long_about = "Precompute and query sales rollups from a transaction CSV\n\nThe file is streamed in batches through a parallel parse pool and reduced into\nrevenue by country, product frequency, monthly volume and regional revenue.\nThe finished snapshot is cached on disk and reused while the file is unchanged.\n\nCOMMON EXAMPLES:\n  salescope transactions.csv\n  salescope transactions.csv --section products --top 5\n  salescope transactions.csv -F json --stats --no-cache"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Transaction CSV file (first line is a header)
    #[arg(required_unless_present = "show_config")]
    pub file: Option<PathBuf>,

    /// Number of rows shown for the product and region rankings
    #[arg(long = "top", default_value_t = 10, help_heading = "Output Options")]
    pub top: usize,

    /// Output format
    #[arg(
        short = 'F',
        long = "output-format",
        value_enum,
        default_value = "default",
        help_heading = "Output Options"
    )]
    pub output_format: OutputFormat,

    /// Rollup to print
    #[arg(
        long = "section",
        value_enum,
        default_value = "all",
        help_heading = "Output Options"
    )]
    pub section: Section,

    /// Print snapshot and ingestion statistics
    #[arg(long = "stats", help_heading = "Output Options")]
    pub stats: bool,

    /// Always recompute; neither read nor write the snapshot cache
    #[arg(long = "no-cache", help_heading = "Cache Options")]
    pub no_cache: bool,

    /// Directory holding snapshot files
    #[arg(long = "cache-dir", help_heading = "Cache Options")]
    pub cache_dir: Option<PathBuf>,

    /// Lines per batch
    #[arg(long = "batch-size", help_heading = "Performance Options")]
    pub batch_size: Option<usize>,

    /// Parse workers per batch (0 = one per CPU)
    #[arg(long = "workers", help_heading = "Performance Options")]
    pub workers: Option<usize>,

    /// Read configuration from FILE on top of the project and user config
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration Options")]
    pub config: Option<PathBuf>,

    /// Show configuration search locations and active settings, then exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long = "log-level", default_value = "info", help_heading = "Configuration Options")]
    pub log_level: log::LevelFilter,
}

impl Cli {
    /// Apply the command-line overrides on top of `config`
    pub fn apply_overrides(&self, mut config: EngineConfig) -> EngineConfig {
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.dir = dir.clone();
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
        config
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            format: self.output_format,
            section: self.section,
            top: self.top,
            include_stats: self.stats,
        }
    }
}
