use std::io::Write;
use std::sync::{Arc, Mutex};

use super::Stage;
use crate::event::{Field, LogEntry};
use crate::stats::AggregatorState;
use crate::task::{FieldSelector, FilterValue, TaskDescriptor, TaskKind};

/// Request statistics: totals, errors, per-IP counts and mean latency
pub struct StatsStage {
    state: Arc<AggregatorState>,
}

impl StatsStage {
    pub fn new(state: Arc<AggregatorState>) -> Self {
        Self { state }
    }
}

impl Stage<LogEntry> for StatsStage {
    fn process(&self, entry: LogEntry) -> LogEntry {
        self.state.record_request(&entry);
        entry
    }
}

/// Frequency counting of one field's values
pub struct TopStage {
    state: Arc<AggregatorState>,
    field: Option<Field>,
}

impl TopStage {
    pub fn new(state: Arc<AggregatorState>, field: Option<Field>) -> Self {
        Self { state, field }
    }
}

impl Stage<LogEntry> for TopStage {
    fn process(&self, entry: LogEntry) -> LogEntry {
        // Unsupported field: pass through
        if let Some(field) = self.field {
            self.state.record_value(field, &entry.field_value(field));
        }
        entry
    }
}

/// Streams every matching record as one JSON line
pub struct FilterStage<W: Write + Send> {
    field: Option<Field>,
    value: FilterValue,
    output: Mutex<W>,
}

impl<W: Write + Send> FilterStage<W> {
    pub fn new(field: Option<Field>, value: FilterValue, output: W) -> Self {
        Self {
            field,
            value,
            output: Mutex::new(output),
        }
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.field
            .is_some_and(|field| self.value.matches(entry, field))
    }

    fn emit(&self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to serialize matching record: {}", e);
                return;
            }
        };

        // A poisoned sink only means another writer panicked mid-line
        let mut output = self
            .output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(output, "{}", line) {
            log::error!("Failed to write matching record: {}", e);
        }
    }

    /// Flush the sink and hand it back
    pub fn into_output(self) -> W {
        let mut output = self
            .output
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = output.flush() {
            log::error!("Failed to flush filter output: {}", e);
        }
        output
    }
}

impl<W: Write + Send> Stage<LogEntry> for FilterStage<W> {
    fn process(&self, entry: LogEntry) -> LogEntry {
        if self.matches(&entry) {
            self.emit(&entry);
        }
        entry
    }
}

/// Pick the stage for `task`. `output` receives filter matches and is
/// unused by the other kinds.
pub fn stage_for_task<W>(
    task: &TaskDescriptor,
    state: Arc<AggregatorState>,
    output: W,
) -> Arc<dyn Stage<LogEntry>>
where
    W: Write + Send + 'static,
{
    let field = task.field.as_ref().and_then(FieldSelector::field);
    match task.kind {
        TaskKind::Stats => Arc::new(StatsStage::new(state)),
        TaskKind::Top => Arc::new(TopStage::new(state, field)),
        TaskKind::Filter => {
            let value = task.value.clone().unwrap_or_else(|| FilterValue::new(""));
            Arc::new(FilterStage::new(field, value, output))
        }
    }
}
