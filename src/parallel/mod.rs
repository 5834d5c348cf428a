//! Worker pool for pipeline execution
//!
//! A fixed set of worker threads pulls pipelines off a bounded queue and
//! runs each one to completion. One dispatcher thread fills the queue and
//! closes it; the join of all workers is the barrier after which the
//! shared aggregation state may be read.
//!
//! # Module Structure
//!
//! - `types`: Pool configuration and run summaries
//! - `worker`: Worker thread loop
//! - `processor`: `WorkerPool` orchestration (dispatcher, workers, join)

mod processor;
mod types;
mod worker;

// Re-export public types
pub use processor::WorkerPool;
pub use types::{PoolConfig, PoolSummary, WorkerReport};
