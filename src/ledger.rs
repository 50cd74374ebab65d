//! Restart bookkeeping for the reduce stage.
//!
//! A key is marked complete only after its notification was dispatched. A
//! crash between dispatch and marking re-dispatches that key on restart, so
//! delivery stays at-least-once.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::storage::{DEFAULT_LEDGER_FILENAME, DEFAULT_STATE_DIR};
use crate::errors::PipelineError;
use crate::types::{PartitionKey, RunId};

/// Records reduce units completed per run id.
pub trait CompletionLedger: Send + Sync {
    /// Returns `true` when `key` already completed in run `run_id`.
    fn is_complete(&self, run_id: &str, key: &str) -> Result<bool, PipelineError>;
    /// Record `key` as completed in run `run_id`.
    fn mark_complete(&self, run_id: &str, key: &str) -> Result<(), PipelineError>;
}

/// Process-local ledger for tests and single-process restarts.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    completed: RwLock<HashMap<RunId, HashSet<PartitionKey>>>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys completed for `run_id`, sorted.
    pub fn completed_keys(&self, run_id: &str) -> Vec<PartitionKey> {
        let completed = self.completed.read().expect("ledger lock poisoned");
        let mut keys: Vec<PartitionKey> = completed
            .get(run_id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl CompletionLedger for InMemoryLedger {
    fn is_complete(&self, run_id: &str, key: &str) -> Result<bool, PipelineError> {
        let completed = self
            .completed
            .read()
            .map_err(|_| PipelineError::Ledger("ledger lock poisoned".into()))?;
        Ok(completed
            .get(run_id)
            .is_some_and(|keys| keys.contains(key)))
    }

    fn mark_complete(&self, run_id: &str, key: &str) -> Result<(), PipelineError> {
        let mut completed = self
            .completed
            .write()
            .map_err(|_| PipelineError::Ledger("ledger lock poisoned".into()))?;
        completed
            .entry(run_id.to_string())
            .or_default()
            .insert(key.to_string());
        Ok(())
    }
}

/// On-disk ledger layout.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    runs: BTreeMap<RunId, BTreeSet<PartitionKey>>,
}

/// JSON-file backed ledger that survives process restarts.
///
/// Every `mark_complete` rewrites the file through a temporary sibling and a
/// rename, so a crash leaves either the old or the new contents.
pub struct FileLedger {
    path: PathBuf,
    state: Mutex<LedgerFile>,
}

impl fmt::Debug for FileLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLedger").field("path", &self.path).finish()
    }
}

impl FileLedger {
    /// Open (or create) a ledger at `path`.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, PipelineError> {
        let path = path.into();
        ensure_parent_dir(&path)?;
        let state = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes).map_err(|err| {
                PipelineError::Ledger(format!("corrupt ledger {}: {err}", path.display()))
            })?
        } else {
            LedgerFile::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Default ledger path under the crate's state directory.
    pub fn default_path() -> PathBuf {
        Self::default_path_in_dir(DEFAULT_STATE_DIR)
    }

    /// Default ledger path inside a custom directory.
    pub fn default_path_in_dir<P: AsRef<Path>>(dir: P) -> PathBuf {
        dir.as_ref().join(DEFAULT_LEDGER_FILENAME)
    }

    /// Path of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run ids recorded in the ledger, sorted.
    pub fn run_ids(&self) -> Result<Vec<RunId>, PipelineError> {
        let state = self
            .state
            .lock()
            .map_err(|_| PipelineError::Ledger("ledger lock poisoned".into()))?;
        Ok(state.runs.keys().cloned().collect())
    }

    /// Keep only the `keep` most recent run ids of each job and drop the rest.
    ///
    /// Run ids are `<job>:<window>` with ISO dates, so lexical order within a
    /// job is chronological. Returns the number of run ids removed.
    pub fn retain_latest_runs(&self, keep: usize) -> Result<usize, PipelineError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| PipelineError::Ledger("ledger lock poisoned".into()))?;
        let mut per_job: BTreeMap<&str, Vec<&RunId>> = BTreeMap::new();
        for run_id in state.runs.keys() {
            let job = run_id.split_once(':').map_or(run_id.as_str(), |(job, _)| job);
            per_job.entry(job).or_default().push(run_id);
        }
        let stale: Vec<RunId> = per_job
            .into_values()
            .flat_map(|runs| {
                let excess = runs.len().saturating_sub(keep);
                runs.into_iter().take(excess).cloned().collect::<Vec<_>>()
            })
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        let mut next = state.clone();
        for run_id in &stale {
            next.runs.remove(run_id);
        }
        self.persist(&next)?;
        *state = next;
        debug!(path = %self.path.display(), removed = stale.len(), "pruned ledger runs");
        Ok(stale.len())
    }

    fn persist(&self, state: &LedgerFile) -> Result<(), PipelineError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CompletionLedger for FileLedger {
    fn is_complete(&self, run_id: &str, key: &str) -> Result<bool, PipelineError> {
        let state = self
            .state
            .lock()
            .map_err(|_| PipelineError::Ledger("ledger lock poisoned".into()))?;
        Ok(state.runs.get(run_id).is_some_and(|keys| keys.contains(key)))
    }

    fn mark_complete(&self, run_id: &str, key: &str) -> Result<(), PipelineError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| PipelineError::Ledger("ledger lock poisoned".into()))?;
        if state.runs.get(run_id).is_some_and(|keys| keys.contains(key)) {
            return Ok(());
        }
        // The in-memory view only changes once the file records the key.
        let mut next = state.clone();
        next.runs
            .entry(run_id.to_string())
            .or_default()
            .insert(key.to_string());
        self.persist(&next)?;
        *state = next;
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), PipelineError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)?,
        _ => {}
    }
    Ok(())
}
