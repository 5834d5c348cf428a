// Core library for the logshard log analysis tool

pub mod chunker;
pub mod cli;
pub mod config;
pub mod config_file;
pub mod event;
pub mod logging;
pub mod parallel;
pub mod pipeline;
pub mod platform;
pub mod readers;
pub mod report;
pub mod runner;
pub mod stats;
pub mod task;

pub use chunker::{compute_chunks, ChunkRange};
pub use config::{AppConfig, LoggingConfig, RunSettings};
pub use event::{Field, LogEntry};
pub use parallel::{PoolConfig, PoolSummary, WorkerPool};
pub use pipeline::{Pipeline, Stage};
pub use platform::CancelToken;
pub use report::merge_results;
pub use runner::{run_task, RunOutcome};
pub use stats::{AggregatorState, StatsSnapshot};
pub use task::{FieldSelector, FilterValue, TaskDescriptor, TaskKind};
