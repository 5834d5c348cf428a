//! Main worker pool
//!
//! Contains the WorkerPool that dispatches pipelines to worker threads and
//! waits for all of them.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Sender};
use std::thread;

use crate::pipeline::Pipeline;
use crate::platform::CancelToken;

use super::types::{PoolConfig, PoolSummary};
use super::worker::worker_thread;

/// Fixed-size pool of pipeline workers
pub struct WorkerPool {
    config: PoolConfig,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    pub fn num_workers(&self) -> usize {
        self.config.num_workers.max(1)
    }

    /// Run every pipeline and block until all workers have exited.
    ///
    /// When `cancel` fires, dispatch stops, queued pipelines are dropped and
    /// in-flight ones stop at their next record; whatever they already
    /// processed stays in the shared state.
    pub fn run<T: Send + 'static>(
        &self,
        pipelines: Vec<Pipeline<T>>,
        cancel: &CancelToken,
    ) -> Result<PoolSummary> {
        let num_workers = self.num_workers();
        let mut summary = PoolSummary {
            pipelines_total: pipelines.len(),
            ..Default::default()
        };

        // Room for every pipeline, so dispatch never waits on the workers
        let (queue_sender, queue_receiver) = bounded(pipelines.len().max(1));

        let mut worker_handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let queue = queue_receiver.clone();
            let worker_cancel = cancel.clone();
            let handle = thread::Builder::new()
                .name(format!("logshard-worker-{}", worker_id))
                .spawn(move || worker_thread(worker_id, queue, worker_cancel))
                .map_err(|e| anyhow!("Failed to spawn worker thread {}: {}", worker_id, e))?;
            worker_handles.push(handle);
        }
        // Workers hold the only receivers from here on
        drop(queue_receiver);
        log::debug!("Engaged {} workers", num_workers);

        let dispatch_handle = {
            let dispatch_cancel = cancel.clone();
            thread::Builder::new()
                .name("logshard-dispatch".to_string())
                .spawn(move || dispatch_thread(pipelines, queue_sender, dispatch_cancel))
                .map_err(|e| anyhow!("Failed to spawn dispatch thread: {}", e))?
        };

        // Join everything before reporting so no thread outlives the run
        let mut first_panic = None;
        match dispatch_handle.join() {
            Ok(dispatched) => summary.pipelines_dispatched = dispatched,
            Err(_) => first_panic = Some("Dispatch thread panicked".to_string()),
        }
        for (idx, handle) in worker_handles.into_iter().enumerate() {
            match handle.join() {
                Ok(report) => summary.merge_worker(&report),
                Err(_) if first_panic.is_none() => {
                    first_panic = Some(format!("Worker thread {} panicked", idx));
                }
                Err(_) => {}
            }
        }
        if let Some(message) = first_panic {
            return Err(anyhow!(message));
        }

        summary.cancelled = cancel.is_cancelled();
        log::debug!(
            "All workers finished: {}/{} pipelines run, {} records{}",
            summary.pipelines_run,
            summary.pipelines_total,
            summary.records_processed,
            if summary.cancelled { " (cancelled)" } else { "" }
        );
        Ok(summary)
    }
}

/// Dispatcher: queue every pipeline, then close the queue by dropping the
/// sender. Returns how many pipelines were queued.
fn dispatch_thread<T: Send + 'static>(
    pipelines: Vec<Pipeline<T>>,
    queue: Sender<Pipeline<T>>,
    cancel: CancelToken,
) -> usize {
    let mut dispatched = 0;
    for pipeline in pipelines {
        if cancel.is_cancelled() {
            log::debug!("Dispatch stopped by cancellation after {} pipelines", dispatched);
            break;
        }
        let id = pipeline.id();
        if queue.send(pipeline).is_err() {
            // Every worker is gone
            break;
        }
        log::debug!("Queued pipeline {}", id);
        dispatched += 1;
    }
    dispatched
}
