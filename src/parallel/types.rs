//! Type definitions for the worker pool

use crate::pipeline::PipelineOutcome;

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub num_workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
        }
    }
}

/// What a single worker got through before its queue closed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub pipelines_run: usize,
    pub records_processed: usize,
    pub failed_sources: usize,
}

impl WorkerReport {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Default::default()
        }
    }

    pub(crate) fn absorb(&mut self, outcome: &PipelineOutcome) {
        self.pipelines_run += 1;
        self.records_processed += outcome.processed;
        if outcome.source_failed {
            self.failed_sources += 1;
        }
    }
}

/// Totals over the whole pool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub pipelines_total: usize,
    pub pipelines_dispatched: usize,
    pub pipelines_run: usize,
    pub records_processed: usize,
    pub failed_sources: usize,
    pub cancelled: bool,
}

impl PoolSummary {
    pub(crate) fn merge_worker(&mut self, report: &WorkerReport) {
        self.pipelines_run += report.pipelines_run;
        self.records_processed += report.records_processed;
        self.failed_sources += report.failed_sources;
    }
}
