//! Run orchestration
//!
//! Ties one task to one file: compute the chunks, build one pipeline per
//! chunk around a shared stage, hand them to the worker pool and keep the
//! aggregation state for the report.

use anyhow::Result;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::chunker::{compute_chunks, ChunkRange};
use crate::config::RunSettings;
use crate::event::LogEntry;
use crate::parallel::{PoolConfig, PoolSummary, WorkerPool};
use crate::pipeline::{stage_for_task, Pipeline, Source, Stage};
use crate::platform::CancelToken;
use crate::readers::RangeReader;
use crate::report;
use crate::stats::AggregatorState;
use crate::task::TaskDescriptor;

/// Everything a finished (or cancelled) run leaves behind
#[derive(Debug)]
pub struct RunOutcome {
    pub state: Arc<AggregatorState>,
    pub summary: PoolSummary,
    pub chunks: Vec<ChunkRange>,
}

impl RunOutcome {
    pub fn write_report<W: Write>(
        &self,
        task: &TaskDescriptor,
        top_n: usize,
        output: &mut W,
    ) -> Result<()> {
        report::merge_results(task, &self.state, top_n, output)
    }
}

/// One pipeline per chunk, all sharing `stage`. Sources open lazily on the
/// worker that claims them.
pub fn build_pipelines(
    path: &Path,
    chunks: &[ChunkRange],
    stage: Arc<dyn Stage<LogEntry>>,
) -> Vec<Pipeline<LogEntry>> {
    chunks
        .iter()
        .enumerate()
        .map(|(id, &range)| {
            let path = path.to_path_buf();
            Pipeline::new(
                id,
                move |cancel: &CancelToken| {
                    let reader = RangeReader::open(&path, range, cancel.clone())?;
                    Ok(Box::new(reader) as Source<LogEntry>)
                },
                Arc::clone(&stage),
            )
        })
        .collect()
}

/// Run `task` over the configured file.
///
/// `filter_output` receives the filter task's JSON lines while the run is
/// in progress; the other tasks never write to it.
pub fn run_task<W>(
    task: &TaskDescriptor,
    settings: &RunSettings,
    cancel: &CancelToken,
    filter_output: W,
) -> Result<RunOutcome>
where
    W: Write + Send + 'static,
{
    task.validate()?;

    let chunks = compute_chunks(&settings.file_path, settings.worker_count)?;
    log::debug!(
        "Split {} into {} chunks",
        settings.file_path.display(),
        chunks.len()
    );
    for (id, chunk) in chunks.iter().enumerate() {
        log::debug!("Chunk {}: bytes {}..{}", id, chunk.start, chunk.end);
    }

    let state = Arc::new(AggregatorState::new());
    let stage = stage_for_task(task, Arc::clone(&state), filter_output);
    let pipelines = build_pipelines(&settings.file_path, &chunks, stage);

    let pool = WorkerPool::new(PoolConfig {
        num_workers: settings.worker_count,
    });
    let summary = pool.run(pipelines, cancel)?;

    if summary.failed_sources > 0 {
        log::warn!(
            "{} of {} chunks could not be read; results are incomplete",
            summary.failed_sources,
            summary.pipelines_total
        );
    }
    if summary.cancelled {
        log::info!(
            "Run cancelled after {} records; reporting partial results",
            summary.records_processed
        );
    }
    log::info!(
        "Task {} processed {} records in {} chunks",
        task.kind,
        summary.records_processed,
        summary.pipelines_run
    );

    Ok(RunOutcome {
        state,
        summary,
        chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Field;
    use std::io::Write as _;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    /// Writer whose contents stay readable after the stage is dropped
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn fixture(rows: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,ip,method,url,status,response_time").unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn settings(path: &Path, workers: usize) -> RunSettings {
        RunSettings {
            file_path: PathBuf::from(path),
            worker_count: workers,
            top_n: 10,
        }
    }

    fn access_rows(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                let status = if i % 7 == 0 { 500 } else { 200 };
                format!(
                    "2024-01-15 10:{:02}:00,10.0.0.{},GET,/page/{},{},{}",
                    i % 60,
                    i % 4,
                    i,
                    status,
                    100 + (i % 3) * 100
                )
            })
            .collect()
    }

    #[test]
    fn test_stats_independent_of_worker_count() {
        let rows = access_rows(300);
        let errors = (0..300).filter(|i| i % 7 == 0).count() as u64;
        let file = fixture(&rows);

        for workers in [1, 2, 3, 8, 64] {
            let outcome = run_task(
                &TaskDescriptor::stats(),
                &settings(file.path(), workers),
                &CancelToken::new(),
                std::io::sink(),
            )
            .unwrap();

            let snapshot = outcome.state.snapshot();
            assert_eq!(snapshot.total_requests, 300, "workers={}", workers);
            assert_eq!(snapshot.error_count, errors, "workers={}", workers);
            let per_ip: u64 = snapshot.requests_by_ip.iter().map(|(_, n)| n).sum();
            assert_eq!(per_ip, 300);
            assert_eq!(snapshot.average_response_ms, 200.0);
            assert_eq!(outcome.chunks.len(), workers);
            assert_eq!(outcome.summary.records_processed, 300);
        }
    }

    #[test]
    fn test_filter_emits_only_matches() {
        let rows = vec![
            "2024-01-15 10:00:00,1.1.1.1,GET,/a,404,10".to_string(),
            "2024-01-15 10:00:01,2.2.2.2,GET,/b,200,20".to_string(),
            "2024-01-15 10:00:02,3.3.3.3,POST,/c,404,30".to_string(),
            "2024-01-15 10:00:03,4.4.4.4,GET,/d,500,40".to_string(),
        ];
        let file = fixture(&rows);
        let buffer = SharedBuffer::default();

        run_task(
            &TaskDescriptor::filter("status", "404"),
            &settings(file.path(), 3),
            &CancelToken::new(),
            buffer.clone(),
        )
        .unwrap();

        let output = buffer.contents();
        let mut matched: Vec<LogEntry> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        matched.sort_by(|a, b| a.ip.cmp(&b.ip));

        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].ip, "1.1.1.1");
        assert_eq!(matched[0].url, "/a");
        assert_eq!(matched[1].ip, "3.3.3.3");
        assert_eq!(matched[1].method, "POST");
        assert_eq!(matched[1].response_time, 30);
    }

    #[test]
    fn test_top_with_ties() {
        let mut rows = Vec::new();
        for (method, n) in [("A", 5), ("B", 3), ("C", 3)] {
            for i in 0..n {
                rows.push(format!("2024-01-15 10:00:0{},9.9.9.9,{},/,200,1", i, method));
            }
        }
        let file = fixture(&rows);

        let task = TaskDescriptor::top("method");
        let outcome = run_task(&task, &settings(file.path(), 4), &CancelToken::new(), std::io::sink())
            .unwrap();

        let top = outcome.state.top_values(Field::Method, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0], ("A".to_string(), 5));
        assert_eq!(top[1].1, 3);

        let mut report = Vec::new();
        outcome.write_report(&task, 2, &mut report).unwrap();
        let report = String::from_utf8(report).unwrap();
        assert!(report.starts_with("Top 2 values for method:\n  A: 5\n"));
    }

    #[test]
    fn test_header_only_file() {
        let file = fixture(&[]);
        let outcome = run_task(
            &TaskDescriptor::stats(),
            &settings(file.path(), 4),
            &CancelToken::new(),
            std::io::sink(),
        )
        .unwrap();
        assert_eq!(outcome.state.total_requests(), 0);
        assert_eq!(outcome.state.average_response_ms(), 0.0);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let rows = vec![
            "2024-01-15 10:00:00,1.1.1.1,GET,/a,200,10".to_string(),
            "garbage".to_string(),
            "2024-01-15 10:00:01,1.1.1.1,GET,/a,abc,10".to_string(),
            "2024-01-15 10:00:02,1.1.1.1,GET,/a,200,30".to_string(),
        ];
        let file = fixture(&rows);
        let outcome = run_task(
            &TaskDescriptor::stats(),
            &settings(file.path(), 2),
            &CancelToken::new(),
            std::io::sink(),
        )
        .unwrap();
        assert_eq!(outcome.state.total_requests(), 2);
        assert_eq!(outcome.state.average_response_ms(), 20.0);
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = run_task(
            &TaskDescriptor::stats(),
            &settings(Path::new("/nonexistent/access.csv"), 2),
            &CancelToken::new(),
            std::io::sink(),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to open source file"));
    }

    #[test]
    fn test_cancelled_run_still_reports() {
        let file = fixture(&access_rows(50));
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcome = run_task(&TaskDescriptor::stats(), &settings(file.path(), 2), &cancel, std::io::sink())
            .unwrap();
        assert!(outcome.summary.cancelled);
        assert_eq!(outcome.state.total_requests(), 0);

        let mut report = Vec::new();
        outcome
            .write_report(&TaskDescriptor::stats(), 10, &mut report)
            .unwrap();
        assert!(String::from_utf8(report).unwrap().starts_with("Statistics:\nTotalRequests: 0\n"));
    }
}
