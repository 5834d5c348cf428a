use anyhow::{anyhow, Result};
use log::LevelFilter;
use std::path::PathBuf;

use crate::cli::Cli;
use crate::config_file::ConfigFile;

pub const DEFAULT_TOP_N: usize = 10;

/// Main configuration struct for logshard
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub run: RunSettings,
    pub logging: LoggingConfig,
}

/// What the run reads and how wide it fans out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub file_path: PathBuf,
    pub worker_count: usize,
    pub top_n: usize,
}

/// Diagnostic output configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub json: bool,
    pub level: LevelFilter,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: LevelFilter::Info,
        }
    }
}

impl AppConfig {
    /// Merge command-line flags over the config file over the defaults
    pub fn resolve(cli: &Cli, file: &ConfigFile) -> Result<Self> {
        let file_path = cli
            .file
            .clone()
            .or_else(|| file.core.filepath.as_ref().map(PathBuf::from))
            .ok_or_else(|| {
                anyhow!("No input file configured: pass --file or set core.filepath in the config file")
            })?;

        let worker_count = cli
            .workers
            .or(file.core.workers)
            .unwrap_or_else(num_cpus::get);
        if worker_count == 0 {
            return Err(anyhow!("Worker count must be at least 1"));
        }

        let top_n = cli.top.or(file.core.tops).unwrap_or(DEFAULT_TOP_N);
        if top_n == 0 {
            return Err(anyhow!("Top count must be at least 1"));
        }

        let level = match cli.log_level.as_deref().or(file.logging.level.as_deref()) {
            Some(level) => parse_level(level)?,
            None => LevelFilter::Info,
        };

        Ok(Self {
            run: RunSettings {
                file_path,
                worker_count,
                top_n,
            },
            logging: LoggingConfig {
                json: cli.log_json || file.logging.json.unwrap_or(false),
                level,
            },
        })
    }
}

/// Parse a level name, ignoring case
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    match level.trim().to_lowercase().as_str() {
        "off" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        _ => Err(anyhow!(
            "Invalid log level '{}': expected error, warn, info, debug or trace",
            level
        )),
    }
}
