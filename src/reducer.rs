//! Reduce stage: one report and one notification per partition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{NotificationConfig, PipelineConfig, ReportConfig, UsageCosts};
use crate::data::{NotificationRequest, PartitionValue};
use crate::dispatch::{
    ArtifactHandle, ArtifactService, ArtifactSpec, Notification, Notifier, message_body,
    resolve_recipient,
};
use crate::errors::PipelineError;
use crate::report::{build_report, render_report};
use crate::scheduler::UsageMeter;
use crate::types::{PartitionKey, RecipientId};

/// Result of a successful reduce unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduceOutcome {
    /// Partition key.
    pub key: PartitionKey,
    /// Recipient the notification was addressed to.
    pub recipient: RecipientId,
    /// Data rows in the attached report.
    pub row_count: usize,
    /// Handle of the created report.
    pub artifact: ArtifactHandle,
    /// The notifier accepted the notification.
    pub email_sent: bool,
}

/// Builds and dispatches the per-partition report.
pub struct Reducer {
    artifacts: Arc<dyn ArtifactService>,
    notifier: Arc<dyn Notifier>,
    notification: NotificationConfig,
    report: ReportConfig,
    costs: UsageCosts,
}

impl Reducer {
    /// Create a reducer using the notification, report, and usage settings in `config`.
    pub fn new(
        artifacts: Arc<dyn ArtifactService>,
        notifier: Arc<dyn Notifier>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            artifacts,
            notifier,
            notification: config.notification.clone(),
            report: config.report.clone(),
            costs: config.usage,
        }
    }

    /// Build the report, resolve the recipient, and pick the message text.
    pub fn build_request(&self, key: &str, values: &[PartitionValue]) -> NotificationRequest {
        NotificationRequest {
            recipient: resolve_recipient(key, &self.notification),
            subject: self.notification.subject.to_string(),
            body: message_body(key, &self.notification).to_string(),
            attachment: build_report(key, values),
        }
    }

    /// Create the artifact and dispatch exactly one notification for `key`.
    pub fn reduce(
        &self,
        key: &str,
        values: &[PartitionValue],
        usage: &UsageMeter,
    ) -> Result<ReduceOutcome, PipelineError> {
        let request = self.build_request(key, values);
        let row_count = request.attachment.row_count();

        usage.charge(self.costs.artifact_create);
        let artifact = self
            .artifacts
            .create(ArtifactSpec {
                name: request.attachment.filename.clone(),
                mime_type: request.attachment.mime_type.clone(),
                content: render_report(&request.attachment, self.report.escaping),
            })
            .map_err(|err| dispatch_error(key, "artifact creation", err))?;

        usage.charge(self.costs.notification);
        let notification = Notification {
            sender: self.notification.sender.to_string(),
            recipient: request.recipient.clone(),
            subject: request.subject,
            body: request.body,
            attachments: vec![artifact.clone()],
        };
        self.notifier
            .send(&notification)
            .map_err(|err| dispatch_error(key, "notification", err))?;

        info!(
            "[sales_digest:reduce] sent {} row(s) for key '{}' to '{}'",
            row_count, key, request.recipient
        );
        Ok(ReduceOutcome {
            key: key.to_string(),
            recipient: request.recipient,
            row_count,
            artifact,
            email_sent: true,
        })
    }
}

fn dispatch_error(key: &str, step: &str, err: PipelineError) -> PipelineError {
    match err {
        PipelineError::PartitionDispatch { .. } => err,
        other => PipelineError::PartitionDispatch {
            key: key.to_string(),
            reason: format!("{step} failed: {other}"),
        },
    }
}
