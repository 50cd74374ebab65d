//! Artifact-creation and notification interfaces plus recipient policy.

use serde::{Deserialize, Serialize};

use crate::config::NotificationConfig;
use crate::errors::PipelineError;
use crate::mapper::is_admin_key;
use crate::types::{RecipientId, SenderId};

/// Outbox implementations of the dispatch interfaces.
pub mod outbox;

pub use outbox::{DirectoryOutbox, RecordingOutbox};

/// Content handed to the artifact-creation interface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Artifact name; creating the same name again replaces it.
    pub name: String,
    /// MIME type of `content`.
    pub mime_type: String,
    /// Rendered artifact body.
    pub content: String,
}

/// Reference to a created artifact, suitable for attachment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    /// Service-assigned identifier used to fetch the artifact.
    pub id: String,
    /// Name the artifact was created under.
    pub name: String,
}

/// Message handed to the notification interface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Identity the message is sent on behalf of.
    pub sender: SenderId,
    /// Recipient identifier.
    pub recipient: RecipientId,
    /// Subject line.
    pub subject: String,
    /// Message text.
    pub body: String,
    /// Artifacts attached by handle.
    pub attachments: Vec<ArtifactHandle>,
}

/// Artifact-creation interface.
///
/// Creating an artifact whose name already exists replaces it, so a retried
/// reduce unit still leaves exactly one artifact per key.
pub trait ArtifactService: Send + Sync {
    /// Store `spec` and return a handle to it.
    fn create(&self, spec: ArtifactSpec) -> Result<ArtifactHandle, PipelineError>;
}

/// Notification interface. Fire-and-forget: `Ok` means accepted, not delivered.
pub trait Notifier: Send + Sync {
    /// Hand `notification` to the delivery service.
    fn send(&self, notification: &Notification) -> Result<(), PipelineError>;
}

/// Recipient for a partition: the admin mailbox for `admin`, else the key itself.
pub fn resolve_recipient(key: &str, config: &NotificationConfig) -> RecipientId {
    if is_admin_key(key) {
        config.admin_mailbox.to_string()
    } else {
        key.to_string()
    }
}

/// Message body for a partition.
pub fn message_body<'a>(key: &str, config: &'a NotificationConfig) -> &'a str {
    if is_admin_key(key) {
        &config.admin_body
    } else {
        &config.rep_body
    }
}
