//! Diagnostic log setup
//!
//! Everything goes to stderr; stdout carries only results.

use anyhow::{Context, Result};
use log::{Log, Metadata, Record};
use serde::Serialize;
use simple_logger::SimpleLogger;
use std::io::{self, Write};

use crate::config::LoggingConfig;

/// Install the global logger. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if config.json {
        log::set_boxed_logger(Box::new(JsonLogger::new(config.level)))
            .context("Failed to install JSON logger")?;
        log::set_max_level(config.level);
    } else {
        SimpleLogger::new()
            .with_level(config.level)
            .init()
            .context("Failed to install logger")?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonLine<'a> {
    level: &'a str,
    target: &'a str,
    msg: String,
}

/// One JSON object per record on stderr
pub struct JsonLogger {
    level: log::LevelFilter,
}

impl JsonLogger {
    pub fn new(level: log::LevelFilter) -> Self {
        Self { level }
    }

    fn render(record: &Record) -> Option<String> {
        let line = JsonLine {
            level: record.level().as_str(),
            target: record.target(),
            msg: record.args().to_string(),
        };
        serde_json::to_string(&line).ok()
    }
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(line) = Self::render(record) {
            // Lock per line so records from different workers never interleave
            let mut stderr = io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, LevelFilter};

    #[test]
    fn test_json_line_shape() {
        let line = JsonLogger::render(
            &Record::builder()
                .level(Level::Warn)
                .target("logshard::readers")
                .args(format_args!("skipping row {}", 7))
                .build(),
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["level"], "WARN");
        assert_eq!(value["target"], "logshard::readers");
        assert_eq!(value["msg"], "skipping row 7");
    }

    #[test]
    fn test_level_filtering() {
        let logger = JsonLogger::new(LevelFilter::Info);
        let debug = Metadata::builder().level(Level::Debug).build();
        let error = Metadata::builder().level(Level::Error).build();
        assert!(!logger.enabled(&debug));
        assert!(logger.enabled(&error));
    }
}
