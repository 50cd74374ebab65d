//! The monthly sales digest expressed as a `StagedJob`.

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::data::{PartitionValue, RawRecord};
use crate::dispatch::{ArtifactService, Notifier};
use crate::errors::PipelineError;
use crate::input::InputEnumerator;
use crate::mapper::map_record;
use crate::reducer::{ReduceOutcome, Reducer};
use crate::scheduler::{RunReport, StagedJob, UnitContext, UsageMeter};
use crate::source::{QueryWindow, RecordStore};
use crate::summary::{ExecutionSummary, Summarizer, SummarySink};
use crate::types::{PartitionKey, RunId, UnitId};

/// Previous-month sales orders grouped per sales representative.
pub struct SalesDigestJob {
    job_name: String,
    enumerator: InputEnumerator,
    reducer: Reducer,
    summarizer: Summarizer,
}

impl SalesDigestJob {
    /// Wire the job to its record store and dispatch services.
    pub fn new(
        config: &PipelineConfig,
        store: Arc<dyn RecordStore>,
        window: QueryWindow,
        artifacts: Arc<dyn ArtifactService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            job_name: config.job_name.to_string(),
            enumerator: InputEnumerator::new(store, window, config.page_size)
                .with_page_cost(config.usage.query_page),
            reducer: Reducer::new(artifacts, notifier, config),
            summarizer: Summarizer::new(),
        }
    }

    /// Also hand the finished summary to `sink`.
    pub fn with_summary_sink(mut self, sink: Box<dyn SummarySink>) -> Self {
        self.summarizer = self.summarizer.with_sink(sink);
        self
    }

    /// Window this run covers.
    pub fn window(&self) -> QueryWindow {
        self.enumerator.window()
    }
}

impl StagedJob for SalesDigestJob {
    type Input = RawRecord;
    type Value = PartitionValue;
    type Output = ReduceOutcome;
    type Summary = ExecutionSummary;

    fn run_id(&self) -> RunId {
        format!("{}:{}", self.job_name, self.enumerator.window())
    }

    fn get_input_data(&self, usage: &UsageMeter) -> Result<Vec<RawRecord>, PipelineError> {
        self.enumerator.collect_all(usage)
    }

    fn unit_id(&self, input: &RawRecord, _position: usize) -> UnitId {
        input.record_id.clone()
    }

    fn map(
        &self,
        input: &RawRecord,
        _ctx: &UnitContext<'_>,
    ) -> Result<(PartitionKey, PartitionValue), PipelineError> {
        map_record(input)
    }

    fn reduce(
        &self,
        key: &str,
        values: &[PartitionValue],
        ctx: &UnitContext<'_>,
    ) -> Result<ReduceOutcome, PipelineError> {
        self.reducer.reduce(key, values, ctx.usage)
    }

    fn summarize(&self, report: RunReport<ReduceOutcome>) -> ExecutionSummary {
        let summary = ExecutionSummary::from_report(report, self.enumerator.window());
        self.summarizer.summarize(&summary);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RecordingOutbox;
    use crate::source::InMemoryRecordStore;
    use chrono::NaiveDate;

    #[test]
    fn run_id_combines_job_name_and_window() {
        let window =
            QueryWindow::previous_month(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()).unwrap();
        let outbox = Arc::new(RecordingOutbox::new());
        let job = SalesDigestJob::new(
            &PipelineConfig::default(),
            Arc::new(InMemoryRecordStore::new("memory", Vec::new())),
            window,
            outbox.clone(),
            outbox,
        );
        assert_eq!(job.run_id(), "monthly_sales_digest:2026-09-01..2026-09-30");
        assert_eq!(job.window(), window);
    }
}
