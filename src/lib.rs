#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line runner for the monthly digest.
pub mod app;
/// Pipeline, scheduler, and notification configuration.
pub mod config;
/// Centralized constants used across stages, stores, and outboxes.
pub mod constants;
/// Record, partition value, and report types.
pub mod data;
/// Artifact and notification interfaces plus outbox implementations.
pub mod dispatch;
/// Input stage: query construction and paged enumeration.
pub mod input;
/// The monthly sales digest job.
pub mod job;
/// Per-run completion ledgers for restart skipping.
pub mod ledger;
/// Map stage: record validation and partition keys.
pub mod mapper;
/// Aggregate metrics helpers.
pub mod metrics;
/// Key-ordered grouping of mapped values.
pub mod partition;
/// Reduce stage: per-partition report and notification.
pub mod reducer;
/// CSV report construction and rendering.
pub mod report;
/// Staged job trait and worker-pool scheduler.
pub mod scheduler;
/// Record store traits, query model, and built-in stores.
pub mod source;
/// Execution summary and summary sinks.
pub mod summary;
/// Shared type aliases.
pub mod types;
/// Text normalization helpers.
pub mod utils;

mod errors;

pub use config::{
    FieldEscaping, NotificationConfig, PipelineConfig, ReportConfig, RetryPolicy, SchedulerConfig,
    UsageCosts,
};
pub use data::{CustomerRef, NotificationRequest, OwnerRef, PartitionValue, RawRecord, ReportArtifact};
pub use dispatch::{
    ArtifactHandle, ArtifactService, ArtifactSpec, DirectoryOutbox, Notification, Notifier,
    RecordingOutbox,
};
pub use errors::PipelineError;
pub use input::InputEnumerator;
pub use job::SalesDigestJob;
pub use ledger::{CompletionLedger, FileLedger, InMemoryLedger};
pub use partition::{Partition, PartitionStore};
pub use reducer::{ReduceOutcome, Reducer};
pub use scheduler::{ExecutionStats, RunReport, Scheduler, StagedJob, UnitContext, UsageMeter};
pub use source::{
    InMemoryRecordStore, JsonExportStore, QueryWindow, RecordQuery, RecordStore, StoredOrder,
};
pub use summary::{ExecutionSummary, JsonSummarySink, KeyState, KeyStatus, Summarizer, SummarySink};
pub use types::{LogMessage, PartitionKey, RecipientId, RecordId, RunId, SenderId, StoreId, UnitId};
