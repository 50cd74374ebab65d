//! Summarize stage: per-key outcomes and run statistics.
//!
//! The summarizer only observes. Sink failures are logged and dropped.

use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::metrics::{PartitionSkew, partition_skew};
use crate::reducer::ReduceOutcome;
use crate::scheduler::{MapFailure, ReduceState, RunReport};
use crate::source::QueryWindow;
use crate::types::{LogMessage, PartitionKey, RecipientId, RunId};

/// Final state of one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    /// Report created and notification accepted in this run.
    Completed,
    /// Retry budget exhausted.
    Failed,
    /// Skipped; the ledger shows an earlier attempt of this run finished it.
    AlreadyCompleted,
}

/// Per-key line of the execution summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStatus {
    /// Values grouped under the key (report rows when completed).
    pub row_count: usize,
    /// A notification was accepted in this run.
    pub email_sent: bool,
    /// Messages of every failed attempt, including recovered ones.
    pub errors: Vec<LogMessage>,
    /// Recipient of the notification sent in this run.
    pub recipient: Option<RecipientId>,
    /// Reduce attempts made; zero when already completed.
    pub attempts: u32,
    /// Final state of the key.
    pub state: KeyState,
}

/// Statistics and outcomes of one pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Job name and window; keys the completion ledger.
    pub run_id: RunId,
    /// Creation-date window the input query covered.
    pub window: QueryWindow,
    /// Records produced by the input stage.
    pub input_count: usize,
    /// Outcome per partition key, in first-emission order.
    pub per_key_status: IndexMap<PartitionKey, KeyStatus>,
    /// Records skipped by the map stage.
    pub map_failures: Vec<MapFailure>,
    /// Interface-call costs charged during the run.
    pub usage_units: u64,
    /// Wall-clock time of the input, map, and reduce stages.
    pub elapsed_seconds: f64,
    /// Peak number of units running at once.
    pub concurrency: usize,
    /// Backoff pauses taken between attempts.
    pub yield_count: u64,
    /// Re-attempts across map and reduce units.
    pub retry_count: u64,
}

impl ExecutionSummary {
    /// Fold a scheduler report into a summary.
    pub fn from_report(report: RunReport<ReduceOutcome>, window: QueryWindow) -> Self {
        let per_key_status = report
            .reductions
            .into_iter()
            .map(|record| {
                let (email_sent, recipient, state) = match record.state {
                    ReduceState::Completed(outcome) => {
                        (outcome.email_sent, Some(outcome.recipient), KeyState::Completed)
                    }
                    ReduceState::Failed => (false, None, KeyState::Failed),
                    ReduceState::AlreadyCompleted => (false, None, KeyState::AlreadyCompleted),
                };
                let status = KeyStatus {
                    row_count: record.value_count,
                    email_sent,
                    errors: record.errors,
                    recipient,
                    attempts: record.attempts,
                    state,
                };
                (record.key, status)
            })
            .collect();
        Self {
            run_id: report.run_id,
            window,
            input_count: report.input_count,
            per_key_status,
            map_failures: report.map_failures,
            usage_units: report.stats.usage_units,
            elapsed_seconds: report.stats.elapsed_seconds,
            concurrency: report.stats.concurrency,
            yield_count: report.stats.yields,
            retry_count: report.stats.retries,
        }
    }

    /// Keys whose retry budget was exhausted.
    pub fn failed_keys(&self) -> Vec<&str> {
        self.per_key_status
            .iter()
            .filter(|(_, status)| status.state == KeyState::Failed)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Number of notifications accepted in this run.
    pub fn notifications_sent(&self) -> usize {
        self.per_key_status
            .values()
            .filter(|status| status.email_sent)
            .count()
    }

    /// Total rows grouped across all keys.
    pub fn grouped_rows(&self) -> usize {
        self.per_key_status
            .values()
            .map(|status| status.row_count)
            .sum()
    }

    /// Returns `true` when no map unit was skipped and no key failed.
    pub fn is_clean(&self) -> bool {
        self.map_failures.is_empty() && self.failed_keys().is_empty()
    }

    /// Distribution of rows across partitions.
    pub fn partition_skew(&self) -> Option<PartitionSkew> {
        let counts: IndexMap<PartitionKey, usize> = self
            .per_key_status
            .iter()
            .map(|(key, status)| (key.clone(), status.row_count))
            .collect();
        partition_skew(&counts)
    }
}

/// Destination for a finished summary.
pub trait SummarySink: Send + Sync {
    /// Persist or forward `summary`.
    fn record(&self, summary: &ExecutionSummary) -> Result<(), PipelineError>;
}

/// Writes the summary as pretty JSON to a file, replacing earlier contents.
#[derive(Clone, Debug)]
pub struct JsonSummarySink {
    path: PathBuf,
}

impl JsonSummarySink {
    /// Sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SummarySink for JsonSummarySink {
    fn record(&self, summary: &ExecutionSummary) -> Result<(), PipelineError> {
        let write = || -> Result<(), PipelineError> {
            match self.path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)?,
                _ => {}
            }
            fs::write(&self.path, serde_json::to_vec_pretty(summary)?)?;
            Ok(())
        };
        write().map_err(|err| {
            PipelineError::Observation(format!("{}: {err}", self.path.display()))
        })
    }
}

/// Logs the summary and forwards it to registered sinks.
#[derive(Default)]
pub struct Summarizer {
    sinks: Vec<Box<dyn SummarySink>>,
}

impl Summarizer {
    /// Summarizer that only logs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward summaries to `sink` as well.
    pub fn with_sink(mut self, sink: Box<dyn SummarySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Log `summary` and hand it to every sink.
    pub fn summarize(&self, summary: &ExecutionSummary) {
        for (key, status) in &summary.per_key_status {
            info!(
                "[sales_digest:summary] key '{}': state={:?} rows={} email_sent={} attempts={} errors={}",
                key,
                status.state,
                status.row_count,
                status.email_sent,
                status.attempts,
                status.errors.len()
            );
            for error in &status.errors {
                warn!("[sales_digest:summary] key '{}' error: {}", key, error);
            }
        }
        for failure in &summary.map_failures {
            warn!(
                "[sales_digest:summary] skipped input unit '{}' after {} attempt(s): {}",
                failure.unit_id,
                failure.attempts,
                failure.errors.last().map(String::as_str).unwrap_or("")
            );
        }
        if let Some(skew) = summary.partition_skew() {
            info!(
                "[sales_digest:summary] partitions={} rows={} max_share={:.2} ratio={:.2}",
                skew.partitions, skew.total, skew.max_share, skew.ratio
            );
        }
        info!(
            "[sales_digest:summary] run '{}' window={} inputs={} usage={} concurrency={} yields={} retries={} elapsed={:.2}s",
            summary.run_id,
            summary.window,
            summary.input_count,
            summary.usage_units,
            summary.concurrency,
            summary.yield_count,
            summary.retry_count,
            summary.elapsed_seconds
        );
        for sink in &self.sinks {
            if let Err(err) = sink.record(summary) {
                warn!("[sales_digest:summary] summary sink failed: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ArtifactHandle;
    use crate::scheduler::{ExecutionStats, ReduceRecord};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn window() -> QueryWindow {
        QueryWindow::previous_month(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()).unwrap()
    }

    fn report() -> RunReport<ReduceOutcome> {
        RunReport {
            run_id: "monthly_sales_digest:2026-09-01..2026-09-30".into(),
            input_count: 4,
            mapped_count: 3,
            map_failures: vec![MapFailure {
                unit_id: "77".into(),
                attempts: 3,
                errors: vec!["bad amount".into(); 3],
            }],
            reductions: vec![
                ReduceRecord {
                    key: "rep1".into(),
                    value_count: 2,
                    attempts: 1,
                    errors: Vec::new(),
                    state: ReduceState::Completed(ReduceOutcome {
                        key: "rep1".into(),
                        recipient: "rep1".into(),
                        row_count: 2,
                        artifact: ArtifactHandle {
                            id: "memory:sales_data_rep1.csv".into(),
                            name: "sales_data_rep1.csv".into(),
                        },
                        email_sent: true,
                    }),
                },
                ReduceRecord {
                    key: "rep2".into(),
                    value_count: 1,
                    attempts: 3,
                    errors: vec!["down".into(); 3],
                    state: ReduceState::Failed,
                },
            ],
            stats: ExecutionStats {
                usage_units: 40,
                elapsed_seconds: 0.5,
                concurrency: 2,
                yields: 4,
                retries: 4,
            },
        }
    }

    struct FailingSink {
        calls: Arc<AtomicUsize>,
    }

    impl SummarySink for FailingSink {
        fn record(&self, _summary: &ExecutionSummary) -> Result<(), PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::Observation("disk full".into()))
        }
    }

    #[test]
    fn summary_reflects_report() {
        let summary = ExecutionSummary::from_report(report(), window());
        assert_eq!(summary.failed_keys(), vec!["rep2"]);
        assert_eq!(summary.notifications_sent(), 1);
        assert_eq!(summary.grouped_rows(), 3);
        assert!(!summary.is_clean());
        let rep1 = &summary.per_key_status["rep1"];
        assert_eq!(rep1.recipient.as_deref(), Some("rep1"));
        assert_eq!(rep1.state, KeyState::Completed);
        assert_eq!(summary.per_key_status["rep2"].errors.len(), 3);
        assert_eq!(summary.yield_count, 4);
        assert_eq!(summary.map_failures[0].unit_id, "77");
    }

    #[test]
    fn sink_failures_do_not_escalate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let summarizer = Summarizer::new()
            .with_sink(Box::new(FailingSink {
                calls: calls.clone(),
            }))
            .with_sink(Box::new(FailingSink {
                calls: calls.clone(),
            }));
        summarizer.summarize(&ExecutionSummary::from_report(report(), window()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn json_sink_writes_readable_summary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runs").join("summary.json");
        let summary = ExecutionSummary::from_report(report(), window());
        JsonSummarySink::new(&path).record(&summary).unwrap();
        let restored: ExecutionSummary =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(restored.per_key_status, summary.per_key_status);
        assert_eq!(restored.window, summary.window);
    }
}
