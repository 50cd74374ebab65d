//! Staged batch execution: input, map, barrier, reduce, summarize.
//!
//! A `StagedJob` provides the four stage functions; the `Scheduler` owns the
//! worker pool, the retry budget, statistics, and the optional completion
//! ledger. Map units run in parallel and their results are collected in input
//! order, so a key's values reach its reducer in enumeration order. No reducer
//! starts before every map unit has finished.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SchedulerConfig;
use crate::errors::PipelineError;
use crate::ledger::CompletionLedger;
use crate::partition::{Partition, PartitionStore};
use crate::types::{LogMessage, PartitionKey, RunId, UnitId};

mod retry;
mod stats;

use retry::run_with_retry;
pub use stats::{ExecutionStats, UsageMeter};
use stats::{ConcurrencyGauge, RetryCounters};

/// Per-attempt context handed to map and reduce units.
#[derive(Clone, Copy, Debug)]
pub struct UnitContext<'a> {
    /// 1-based attempt number for this unit.
    pub attempt: u32,
    /// Meter to charge interface calls against.
    pub usage: &'a UsageMeter,
}

/// A batch job expressed as explicit stage functions.
pub trait StagedJob: Send + Sync {
    /// Raw unit produced by the input stage.
    type Input: Send + Sync;
    /// Normalized value grouped by key.
    type Value: Send + Sync;
    /// Result of one successful reduce unit.
    type Output: Send;
    /// Result of the summarize stage.
    type Summary;

    /// Stable identity of this run, used to key the completion ledger.
    fn run_id(&self) -> RunId;

    /// Produce every input unit. Any error aborts the run.
    fn get_input_data(&self, usage: &UsageMeter) -> Result<Vec<Self::Input>, PipelineError>;

    /// Label used for `input` in logs and map failure records.
    fn unit_id(&self, _input: &Self::Input, position: usize) -> UnitId {
        format!("row#{position}")
    }

    /// Map one input unit to its key and value.
    fn map(
        &self,
        input: &Self::Input,
        ctx: &UnitContext<'_>,
    ) -> Result<(PartitionKey, Self::Value), PipelineError>;

    /// Reduce every value emitted for `key`, in emission order.
    fn reduce(
        &self,
        key: &str,
        values: &[Self::Value],
        ctx: &UnitContext<'_>,
    ) -> Result<Self::Output, PipelineError>;

    /// Observe the finished run.
    fn summarize(&self, report: RunReport<Self::Output>) -> Self::Summary;
}

/// Map unit that exhausted its retry budget and was skipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapFailure {
    /// Unit label, the record id for the sales digest.
    pub unit_id: UnitId,
    /// Attempts made, first attempt included.
    pub attempts: u32,
    /// One message per failed attempt.
    pub errors: Vec<LogMessage>,
}

/// Final state of one reduce unit.
#[derive(Clone, Debug, PartialEq)]
pub enum ReduceState<O> {
    /// Reduced in this run.
    Completed(O),
    /// Retry budget exhausted.
    Failed,
    /// Skipped because the ledger shows it completed in an earlier attempt of this run.
    AlreadyCompleted,
}

/// Outcome of one reduce unit plus its attempt history.
#[derive(Clone, Debug)]
pub struct ReduceRecord<O> {
    /// Partition key.
    pub key: PartitionKey,
    /// Values grouped under the key.
    pub value_count: usize,
    /// Attempts made; zero when skipped.
    pub attempts: u32,
    /// One message per failed attempt.
    pub errors: Vec<LogMessage>,
    /// Final state of the unit.
    pub state: ReduceState<O>,
}

/// Everything the summarize stage gets to observe.
#[derive(Clone, Debug)]
pub struct RunReport<O> {
    /// Identity of the run.
    pub run_id: RunId,
    /// Units produced by the input stage.
    pub input_count: usize,
    /// Units that mapped successfully.
    pub mapped_count: usize,
    /// Map units skipped after exhausting their retry budget.
    pub map_failures: Vec<MapFailure>,
    /// One record per distinct key.
    pub reductions: Vec<ReduceRecord<O>>,
    /// Run-wide statistics.
    pub stats: ExecutionStats,
}

/// Worker-pool driver for `StagedJob`s.
pub struct Scheduler {
    config: SchedulerConfig,
    pool: ThreadPool,
    ledger: Option<Arc<dyn CompletionLedger>>,
}

impl Scheduler {
    /// Build a scheduler with a dedicated pool of `max_concurrency` threads.
    pub fn new(config: SchedulerConfig) -> Result<Self, PipelineError> {
        if config.max_concurrency == 0 {
            return Err(PipelineError::Configuration(
                "max_concurrency must be greater than zero".into(),
            ));
        }
        if config.retry.max_attempts == 0 {
            return Err(PipelineError::Configuration(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency)
            .thread_name(|idx| format!("sales-digest-worker-{idx}"))
            .build()
            .map_err(|err| PipelineError::Configuration(format!("worker pool: {err}")))?;
        Ok(Self {
            config,
            pool,
            ledger: None,
        })
    }

    /// Skip reduce units the ledger reports complete, and record new completions.
    pub fn with_ledger(mut self, ledger: Arc<dyn CompletionLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run every stage and return the job's summary.
    pub fn run<J: StagedJob>(&self, job: &J) -> Result<J::Summary, PipelineError> {
        let report = self.execute(job)?;
        Ok(job.summarize(report))
    }

    /// Run input, map, and reduce stages and return the raw report.
    pub fn execute<J: StagedJob>(&self, job: &J) -> Result<RunReport<J::Output>, PipelineError> {
        let started = Instant::now();
        let run_id = job.run_id();
        let usage = UsageMeter::new();
        let counters = RetryCounters::default();
        let gauge = ConcurrencyGauge::default();

        let inputs = job.get_input_data(&usage)?;
        let input_count = inputs.len();
        info!(
            "[sales_digest:scheduler] run '{}' input stage produced {} units",
            run_id, input_count
        );

        let mapped = self.pool.install(|| {
            inputs
                .par_iter()
                .enumerate()
                .map(|(position, input)| {
                    let _active = gauge.enter();
                    let unit_id = job.unit_id(input, position);
                    let attempted =
                        run_with_retry(&self.config.retry, &counters, &unit_id, |attempt| {
                            job.map(input, &UnitContext { attempt, usage: &usage })
                        });
                    (unit_id, attempted)
                })
                .collect::<Vec<_>>()
        });

        // Barrier: every map unit has finished before grouping starts.
        let mut store = PartitionStore::new();
        let mut map_failures = Vec::new();
        for (unit_id, attempted) in mapped {
            match attempted.result {
                Ok((key, value)) => store.emit(key, value),
                Err(err) => {
                    warn!(
                        "[sales_digest:map] skipping unit '{}' after {} attempt(s): {}",
                        unit_id, attempted.attempts, err
                    );
                    map_failures.push(MapFailure {
                        unit_id,
                        attempts: attempted.attempts,
                        errors: attempted.errors,
                    });
                }
            }
        }
        let mapped_count = store.value_count();
        info!(
            "[sales_digest:scheduler] map stage complete: mapped={} skipped={} partitions={}",
            mapped_count,
            map_failures.len(),
            store.len()
        );

        let partitions = store.into_partitions();
        let reductions = self.pool.install(|| {
            partitions
                .into_par_iter()
                .map(|partition| {
                    let _active = gauge.enter();
                    self.reduce_partition(job, &run_id, partition, &usage, &counters)
                })
                .collect::<Vec<_>>()
        });

        let stats = ExecutionStats {
            usage_units: usage.total(),
            elapsed_seconds: started.elapsed().as_secs_f64(),
            concurrency: gauge.peak(),
            yields: counters.yields(),
            retries: counters.retries(),
        };
        Ok(RunReport {
            run_id,
            input_count,
            mapped_count,
            map_failures,
            reductions,
            stats,
        })
    }

    fn reduce_partition<J: StagedJob>(
        &self,
        job: &J,
        run_id: &str,
        partition: Partition<J::Value>,
        usage: &UsageMeter,
        counters: &RetryCounters,
    ) -> ReduceRecord<J::Output> {
        let Partition { key, values } = partition;
        let value_count = values.len();

        if self.already_completed(run_id, &key) {
            info!(
                "[sales_digest:reduce] key '{}' already completed in run '{}'; skipping",
                key, run_id
            );
            return ReduceRecord {
                key,
                value_count,
                attempts: 0,
                errors: Vec::new(),
                state: ReduceState::AlreadyCompleted,
            };
        }

        let attempted = run_with_retry(&self.config.retry, counters, &key, |attempt| {
            job.reduce(&key, &values, &UnitContext { attempt, usage })
        });
        let state = match attempted.result {
            Ok(output) => {
                self.record_completion(run_id, &key);
                ReduceState::Completed(output)
            }
            Err(err) => {
                warn!(
                    "[sales_digest:reduce] key '{}' failed after {} attempt(s): {}",
                    key, attempted.attempts, err
                );
                ReduceState::Failed
            }
        };
        ReduceRecord {
            key,
            value_count,
            attempts: attempted.attempts,
            errors: attempted.errors,
            state,
        }
    }

    fn already_completed(&self, run_id: &str, key: &str) -> bool {
        let Some(ledger) = self.ledger.as_ref() else {
            return false;
        };
        match ledger.is_complete(run_id, key) {
            Ok(done) => done,
            Err(err) => {
                warn!(
                    "[sales_digest:ledger] lookup for key '{}' failed, reducing again: {}",
                    key, err
                );
                false
            }
        }
    }

    fn record_completion(&self, run_id: &str, key: &str) {
        let Some(ledger) = self.ledger.as_ref() else {
            return;
        };
        if let Err(err) = ledger.mark_complete(run_id, key) {
            warn!(
                "[sales_digest:ledger] failed to record completion of key '{}': {}",
                key, err
            );
        }
    }
}
