use anyhow::Result;
use std::sync::Arc;

use crate::platform::CancelToken;

pub mod stages;

pub use stages::*;

/// Lazy, finite record sequence feeding one pipeline
pub type Source<T> = Box<dyn Iterator<Item = T> + Send>;

/// Deferred constructor for a pipeline's source; runs on the worker that
/// claims the pipeline, so no file is opened before its turn.
pub type SourceFn<T> = Box<dyn FnOnce(&CancelToken) -> Result<Source<T>> + Send>;

/// Processing stage applied to every record of a pipeline
///
/// Stages are shared by all workers at once, so they take `&self` and keep
/// any mutable state behind atomics. The record is handed back unchanged
/// so stages keep a uniform record-to-record shape.
pub trait Stage<T>: Send + Sync {
    fn process(&self, item: T) -> T;
}

impl<T, F> Stage<T> for F
where
    F: Fn(T) -> T + Send + Sync,
{
    fn process(&self, item: T) -> T {
        self(item)
    }
}

/// What happened when a pipeline ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub id: usize,
    pub processed: usize,
    pub cancelled: bool,
    pub source_failed: bool,
}

/// One schedulable unit of work: a record source paired with a stage
pub struct Pipeline<T> {
    id: usize,
    source: SourceFn<T>,
    stage: Arc<dyn Stage<T>>,
}

impl<T: Send + 'static> Pipeline<T> {
    pub fn new<F>(id: usize, source: F, stage: Arc<dyn Stage<T>>) -> Self
    where
        F: FnOnce(&CancelToken) -> Result<Source<T>> + Send + 'static,
    {
        Self {
            id,
            source: Box::new(source),
            stage,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Drain the source through the stage, stopping early on cancellation
    pub fn run(self, cancel: &CancelToken) -> PipelineOutcome {
        let mut outcome = PipelineOutcome {
            id: self.id,
            ..Default::default()
        };
        log::debug!("Pipeline {} started", self.id);

        let source = match (self.source)(cancel) {
            Ok(source) => source,
            Err(e) => {
                log::error!("Pipeline {} could not open its source: {:#}", self.id, e);
                outcome.source_failed = true;
                return outcome;
            }
        };

        for item in source {
            if cancel.is_cancelled() {
                break;
            }
            self.stage.process(item);
            outcome.processed += 1;
        }

        outcome.cancelled = cancel.is_cancelled();
        log::debug!(
            "Pipeline {} finished: {} records{}",
            self.id,
            outcome.processed,
            if outcome.cancelled { " (cancelled)" } else { "" }
        );
        outcome
    }
}
