// CLI-specific types and structures
// This module contains the command-line interface definitions and the
// mapping from subcommands to task descriptors

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::task::TaskDescriptor;

// CLI structure - contains all command-line arguments and options
#[derive(Parser, Debug)]
#[command(name = "logshard")]
#[command(about = "Parallel byte-range sharded analysis of delimited access logs")]
#[command(
    long_about = "Parallel byte-range sharded analysis of delimited access logs\n\nThe input file is split into line-aligned byte ranges, one per worker, and\nevery range is parsed and aggregated concurrently.\n\nINPUT:\n  A header row followed by rows of: timestamp, ip, method, url, status, response_time\n\nCOMMON EXAMPLES:\n  logshard --file access.csv stats\n  logshard --file access.csv -n 5 top ip\n  logshard --file access.csv filter status 404\n\nSettings not given on the command line are read from ./config.json or\n$XDG_CONFIG_HOME/logshard/config.json (see --show-config)."
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Use a specific configuration file instead of the default lookup
    #[arg(short = 'c', long = "config", global = true, help_heading = "Configuration Options")]
    pub config_file: Option<String>,

    /// Ignore all configuration files
    #[arg(long = "ignore-config", global = true, help_heading = "Configuration Options")]
    pub ignore_config: bool,

    /// Show configuration file locations and exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,

    /// Access log to analyse (overrides core.filepath)
    #[arg(long = "file", global = true, help_heading = "Input Options")]
    pub file: Option<PathBuf>,

    /// Number of workers, one byte range each (default: number of CPUs)
    #[arg(short = 'j', long = "workers", global = true, help_heading = "Performance Options")]
    pub workers: Option<usize>,

    /// How many values the top task reports (default: 10)
    #[arg(short = 'n', long = "top", global = true, help_heading = "Output Options")]
    pub top: Option<usize>,

    /// Diagnostic level: error, warn, info, debug or trace (default: info)
    #[arg(long = "log-level", global = true, help_heading = "Logging Options")]
    pub log_level: Option<String>,

    /// Emit diagnostics as JSON lines on stderr
    #[arg(long = "log-json", global = true, help_heading = "Logging Options")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Request totals, error count, mean response time and requests per IP
    Stats,
    /// Most frequent values of a field
    Top {
        /// timestamp, ip, method, url, status or response_time
        field: String,
    },
    /// Print every record whose field equals the value, as JSON lines
    Filter {
        /// timestamp, ip, method, url, status or response_time
        field: String,
        /// Value to compare against (method ignores case)
        value: String,
    },
}

impl Command {
    pub fn task(&self) -> TaskDescriptor {
        match self {
            Command::Stats => TaskDescriptor::stats(),
            Command::Top { field } => TaskDescriptor::top(field),
            Command::Filter { field, value } => TaskDescriptor::filter(field, value),
        }
    }
}
