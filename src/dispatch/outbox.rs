use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use indexmap::IndexMap;
use tracing::debug;

use super::{ArtifactHandle, ArtifactService, ArtifactSpec, Notification, Notifier};
use crate::constants::storage::{OUTBOX_ARTIFACT_DIR, OUTBOX_NOTIFICATION_LOG};
use crate::errors::PipelineError;

/// In-memory outbox that records artifacts and notifications.
#[derive(Debug, Default)]
pub struct RecordingOutbox {
    artifacts: Mutex<IndexMap<String, ArtifactSpec>>,
    sent: Mutex<Vec<Notification>>,
}

impl RecordingOutbox {
    /// Create an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Artifacts currently stored, in first-creation order.
    pub fn artifacts(&self) -> Vec<ArtifactSpec> {
        self.artifacts
            .lock()
            .expect("outbox artifacts poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Stored artifact named `name`.
    pub fn artifact(&self, name: &str) -> Option<ArtifactSpec> {
        self.artifacts
            .lock()
            .expect("outbox artifacts poisoned")
            .get(name)
            .cloned()
    }

    /// Notifications accepted so far, in send order.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("outbox notifications poisoned").clone()
    }

    /// Notifications addressed to `recipient`.
    pub fn sent_to(&self, recipient: &str) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|notification| notification.recipient == recipient)
            .collect()
    }
}

impl ArtifactService for RecordingOutbox {
    fn create(&self, spec: ArtifactSpec) -> Result<ArtifactHandle, PipelineError> {
        let handle = ArtifactHandle {
            id: format!("memory:{}", spec.name),
            name: spec.name.clone(),
        };
        self.artifacts
            .lock()
            .map_err(|_| PipelineError::Observation("outbox artifacts poisoned".into()))?
            .insert(spec.name.clone(), spec);
        Ok(handle)
    }
}

impl Notifier for RecordingOutbox {
    fn send(&self, notification: &Notification) -> Result<(), PipelineError> {
        self.sent
            .lock()
            .map_err(|_| PipelineError::Observation("outbox notifications poisoned".into()))?
            .push(notification.clone());
        Ok(())
    }
}

/// Filesystem outbox.
///
/// Artifacts land in `<root>/artifacts/<name>`; notifications are appended to
/// `<root>/notifications.jsonl`, one JSON object per line.
#[derive(Debug)]
pub struct DirectoryOutbox {
    root: PathBuf,
    log_lock: Mutex<()>,
}

impl DirectoryOutbox {
    /// Open (or create) an outbox rooted at `root`.
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self, PipelineError> {
        let root = root.into();
        fs::create_dir_all(root.join(OUTBOX_ARTIFACT_DIR))?;
        Ok(Self {
            root,
            log_lock: Mutex::new(()),
        })
    }

    /// Outbox root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the artifact stored under `name`.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.root
            .join(OUTBOX_ARTIFACT_DIR)
            .join(sanitize_file_name(name))
    }

    /// Path of the notification log.
    pub fn notification_log_path(&self) -> PathBuf {
        self.root.join(OUTBOX_NOTIFICATION_LOG)
    }

    /// Read back every logged notification.
    pub fn read_notifications(&self) -> Result<Vec<Notification>, PipelineError> {
        let path = self.notification_log_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(path)?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(PipelineError::from))
            .collect()
    }
}

impl ArtifactService for DirectoryOutbox {
    fn create(&self, spec: ArtifactSpec) -> Result<ArtifactHandle, PipelineError> {
        let path = self.artifact_path(&spec.name);
        fs::write(&path, spec.content.as_bytes())?;
        debug!(path = %path.display(), mime_type = %spec.mime_type, "wrote artifact");
        Ok(ArtifactHandle {
            id: path.display().to_string(),
            name: spec.name,
        })
    }
}

impl Notifier for DirectoryOutbox {
    fn send(&self, notification: &Notification) -> Result<(), PipelineError> {
        let mut line = serde_json::to_string(notification)?;
        line.push('\n');
        let _guard = self
            .log_lock
            .lock()
            .map_err(|_| PipelineError::Observation("outbox log lock poisoned".into()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.notification_log_path())?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Percent-encode every byte outside `[A-Za-z0-9._-]` (and `%` itself).
///
/// The encoding is injective, so distinct artifact names never share a file.
/// Names made only of dots are fully encoded so they cannot address `.` or `..`.
fn sanitize_file_name(name: &str) -> String {
    let all_dots = !name.is_empty() && name.bytes().all(|byte| byte == b'.');
    let mut cleaned = String::with_capacity(name.len());
    for byte in name.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_')
            || (byte == b'.' && !all_dots);
        if keep {
            cleaned.push(byte as char);
        } else {
            cleaned.push_str(&format!("%{byte:02X}"));
        }
    }
    if cleaned.is_empty() {
        "%".to_string()
    } else {
        cleaned
    }
}
