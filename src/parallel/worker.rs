//! Worker thread for the pool
//!
//! Claims pipelines one at a time and runs each to completion.

use crossbeam_channel::Receiver;

use crate::pipeline::Pipeline;
use crate::platform::CancelToken;

use super::types::WorkerReport;

/// Worker thread: runs queued pipelines until the queue closes or the run
/// is cancelled
pub(crate) fn worker_thread<T: Send + 'static>(
    worker_id: usize,
    queue: Receiver<Pipeline<T>>,
    cancel: CancelToken,
) -> WorkerReport {
    let mut report = WorkerReport::new(worker_id);

    while let Ok(pipeline) = queue.recv() {
        if cancel.is_cancelled() {
            log::debug!(
                "Worker {} dropping pipeline {} after cancellation",
                worker_id,
                pipeline.id()
            );
            break;
        }

        log::debug!("Worker {} picked up pipeline {}", worker_id, pipeline.id());
        let outcome = pipeline.run(&cancel);
        report.absorb(&outcome);
    }

    log::debug!(
        "Worker {} exiting after {} pipelines, {} records",
        worker_id,
        report.pipelines_run,
        report.records_processed
    );
    report
}
