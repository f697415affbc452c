use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;

const PROJECT_CONFIG_NAME: &str = ".salescoperc";

/// Configuration file handler for salescope
///
/// Every field is optional; only the keys present in a file override the
/// layer below it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigFile {
    pub batch_size: Option<usize>,
    pub workers: Option<usize>,
    pub read_buffer_bytes: Option<usize>,
    pub delimiter: Option<u8>,
    pub cache_enabled: Option<bool>,
    pub cache_dir: Option<PathBuf>,
}

impl ConfigFile {
    /// Find project-level .salescoperc by walking up from the current directory
    pub fn find_project_config() -> Option<PathBuf> {
        let current = env::current_dir().ok()?;
        Self::find_project_config_from(&current)
    }

    /// Find project-level .salescoperc by walking up from `start`
    pub fn find_project_config_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let config_path = current.join(PROJECT_CONFIG_NAME);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !current.pop() {
                break;
            }
        }
        None
    }

    /// Get list of user config file locations in order of preference
    pub fn get_user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if cfg!(windows) {
            if let Ok(appdata) = env::var("APPDATA") {
                paths.push(PathBuf::from(appdata).join("salescope").join("config.ini"));
            }
            if let Ok(userprofile) = env::var("USERPROFILE") {
                paths.push(PathBuf::from(userprofile).join(PROJECT_CONFIG_NAME));
            }
        } else {
            let xdg_config = env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    env::var("HOME")
                        .map(|h| PathBuf::from(h).join(".config"))
                        .unwrap_or_else(|_| PathBuf::from(".config"))
                });

            paths.push(xdg_config.join("salescope").join("config.ini"));

            if let Ok(home) = env::var("HOME") {
                paths.push(PathBuf::from(home).join(PROJECT_CONFIG_NAME));
            }
        }

        paths
    }

    /// Load configuration with precedence: project > user > defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Only the first existing user file counts
        if let Some(path) = Self::get_user_config_paths().into_iter().find(|p| p.is_file()) {
            config = config.merged_with(Self::load_from_path(&path)?);
        }

        if let Some(project_path) = Self::find_project_config() {
            config = config.merged_with(Self::load_from_path(&project_path)?);
        }

        Ok(config)
    }

    /// Load the regular layers, then `custom_path` on top when given
    pub fn load_with_custom_path(custom_path: Option<&Path>) -> Result<Self> {
        let config = Self::load()?;
        match custom_path {
            Some(path) => Ok(config.merged_with(Self::load_from_path(path)?)),
            None => Ok(config),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse_ini_content(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse INI content from string
    fn parse_ini_content(content: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut current_section = String::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].trim().to_string();
                continue;
            }

            let Some(eq_pos) = line.find('=') else {
                continue;
            };
            let key = line[..eq_pos].trim();
            let value = line[eq_pos + 1..].trim();
            let context = || format!("line {}: {} = {}", index + 1, key, value);

            match (current_section.as_str(), key) {
                ("engine", "batch_size") => {
                    config.batch_size = Some(value.parse().with_context(context)?)
                }
                ("engine", "workers") => config.workers = Some(value.parse().with_context(context)?),
                ("engine", "read_buffer_bytes") => {
                    config.read_buffer_bytes = Some(value.parse().with_context(context)?)
                }
                ("engine", "delimiter") => {
                    config.delimiter = Some(parse_delimiter(value).with_context(context)?)
                }
                ("cache", "enabled") => {
                    config.cache_enabled = Some(parse_bool(value).with_context(context)?)
                }
                ("cache", "dir") => config.cache_dir = Some(PathBuf::from(value)),
                // Ignore unknown sections and keys
                _ => {}
            }
        }

        Ok(config)
    }

    /// Merge two configuration layers, with `overlay` taking precedence
    pub fn merged_with(self, overlay: Self) -> Self {
        Self {
            batch_size: overlay.batch_size.or(self.batch_size),
            workers: overlay.workers.or(self.workers),
            read_buffer_bytes: overlay.read_buffer_bytes.or(self.read_buffer_bytes),
            delimiter: overlay.delimiter.or(self.delimiter),
            cache_enabled: overlay.cache_enabled.or(self.cache_enabled),
            cache_dir: overlay.cache_dir.or(self.cache_dir),
        }
    }

    /// Apply the file settings on top of `config`
    pub fn apply(&self, mut config: EngineConfig) -> EngineConfig {
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(read_buffer_bytes) = self.read_buffer_bytes {
            config.read_buffer_bytes = read_buffer_bytes;
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(enabled) = self.cache_enabled {
            config.cache.enabled = enabled;
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.dir = dir.clone();
        }
        config
    }

    /// Show configuration information with precedence details
    pub fn show_config(custom_path: Option<&Path>) {
        println!("Configuration precedence: CLI > --config > project .salescoperc > user config > defaults\n");

        let project_config_path = Self::find_project_config();
        let user_config_paths = Self::get_user_config_paths();

        match Self::load_with_custom_path(custom_path) {
            Ok(merged) => {
                let engine = merged.apply(EngineConfig::default());
                println!("Active engine settings:");
                println!("  batch_size = {}", engine.batch_size);
                println!("  workers = {}", engine.workers);
                println!("  read_buffer_bytes = {}", engine.read_buffer_bytes);
                println!("  delimiter = {:?}", engine.delimiter as char);
                println!("  cache.enabled = {}", engine.cache.enabled);
                println!("  cache.dir = {}", engine.cache.dir.display());
            }
            Err(e) => {
                eprintln!("Error loading configuration: {:#}", e);
            }
        }

        println!("\nConfiguration search locations (in precedence order):");
        if let Some(path) = custom_path {
            println!("  0. --config: {} {}", path.display(), found_marker(path));
        }
        match &project_config_path {
            Some(path) => println!("  1. Project: {} (found)", path.display()),
            None => println!("  1. Project: {} (searched up directory tree, not found)", PROJECT_CONFIG_NAME),
        }
        for (i, path) in user_config_paths.iter().enumerate() {
            println!("  {}. User: {} {}", i + 2, path.display(), found_marker(path));
        }

        if project_config_path.is_none() && !user_config_paths.iter().any(|p| p.is_file()) {
            println!("\nExample configuration file ({}):", PROJECT_CONFIG_NAME);
            println!();
            println!("[engine]");
            println!("batch_size = 10000");
            println!("workers = 10");
            println!();
            println!("[cache]");
            println!("enabled = true");
            println!("dir = .cache");
        }
    }
}

fn found_marker(path: &Path) -> &'static str {
    if path.is_file() {
        "(found)"
    } else {
        "(not found)"
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(anyhow!("expected a boolean, got '{}'", value)),
    }
}

/// Accepts a single ASCII character, or `tab` / `\t`
fn parse_delimiter(value: &str) -> Result<u8> {
    match value {
        "tab" | "\\t" => Ok(b'\t'),
        _ if value.len() == 1 && value.is_ascii() => Ok(value.as_bytes()[0]),
        _ => Err(anyhow!("delimiter must be a single ASCII character")),
    }
}
