//! Final report rendering
//!
//! Runs once, after every worker has been joined, over whatever the
//! aggregation state holds at that point (complete or cancelled run alike).

use anyhow::Result;
use std::io::Write;

use crate::stats::{AggregatorState, StatsSnapshot};
use crate::task::{TaskDescriptor, TaskKind};

/// Ranked values for the top task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopReport {
    pub field: String,
    pub values: Option<Vec<(String, u64)>>,
}

/// Render the report for `task` from the final state.
///
/// The filter task streamed its output while running and renders nothing.
pub fn merge_results<W: Write>(
    task: &TaskDescriptor,
    state: &AggregatorState,
    top_n: usize,
    output: &mut W,
) -> Result<()> {
    match task.kind {
        TaskKind::Stats => write_stats(output, &state.snapshot())?,
        TaskKind::Top => {
            let report = top_report(task, state, top_n);
            write_top(output, &report)?;
        }
        TaskKind::Filter => {}
    }
    output.flush()?;
    Ok(())
}

pub fn top_report(task: &TaskDescriptor, state: &AggregatorState, top_n: usize) -> TopReport {
    let selector = task.field.as_ref();
    TopReport {
        field: selector.map(ToString::to_string).unwrap_or_default(),
        values: selector
            .and_then(|selector| selector.field())
            .and_then(|field| state.top_values(field, top_n)),
    }
}

pub fn write_stats<W: Write>(output: &mut W, stats: &StatsSnapshot) -> std::io::Result<()> {
    writeln!(output, "Statistics:")?;
    writeln!(output, "TotalRequests: {}", stats.total_requests)?;
    writeln!(output, "ErrorCount: {}", stats.error_count)?;
    writeln!(output, "AverageRespTime: {:.2}ms", stats.average_response_ms)?;
    writeln!(output, "RequestsByIP:")?;
    for (ip, count) in &stats.requests_by_ip {
        writeln!(output, "  {}: {}", ip, count)?;
    }
    Ok(())
}

pub fn write_top<W: Write>(output: &mut W, report: &TopReport) -> std::io::Result<()> {
    match &report.values {
        None => writeln!(output, "No results for field {}", report.field),
        Some(values) => {
            writeln!(output, "Top {} values for {}:", values.len(), report.field)?;
            for (value, count) in values {
                writeln!(output, "  {}: {}", value, count)?;
            }
            Ok(())
        }
    }
}
