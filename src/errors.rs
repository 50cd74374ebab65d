use std::io;

use thiserror::Error;

use crate::types::{PartitionKey, StoreId, UnitId};

/// Error type for pipeline input, unit, dispatch, and persistence failures.
///
/// Only `FatalInput` and `Configuration` abort a run. Unit and partition
/// errors stay with the unit that produced them and surface in the
/// execution summary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The record store rejected or failed the input query.
    #[error("record store '{store_id}' could not serve the input query: {reason}")]
    FatalInput {
        /// Store that served the query.
        store_id: StoreId,
        /// Store-reported cause.
        reason: String,
    },
    /// One record could not be turned into a keyed value.
    #[error("unit '{unit_id}' could not be mapped: {reason}")]
    UnitTransform {
        /// Record id of the unit.
        unit_id: UnitId,
        /// Why the transform failed.
        reason: String,
    },
    /// Artifact creation or notification failed for one partition.
    #[error("partition '{key}' dispatch failed: {reason}")]
    PartitionDispatch {
        /// Partition key.
        key: PartitionKey,
        /// Failing step and its cause.
        reason: String,
    },
    /// A summary sink could not record the run.
    #[error("failed to record execution statistics: {0}")]
    Observation(String),
    /// The completion ledger could not be read or written.
    #[error("completion ledger failure: {0}")]
    Ledger(String),
    /// Filesystem error from a store, outbox, or ledger.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Malformed JSON in an export, ledger, or outbox log.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Invalid settings; aborts before any unit runs.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    /// Returns `true` when the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::FatalInput { .. } | PipelineError::Configuration(_)
        )
    }
}
