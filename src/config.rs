use std::borrow::Cow;
use std::time::Duration;

use crate::constants::notification::{
    DEFAULT_ADMIN_BODY, DEFAULT_ADMIN_MAILBOX, DEFAULT_REP_BODY, DEFAULT_SENDER, DEFAULT_SUBJECT,
};
use crate::constants::scheduler::{
    DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_JOB_NAME, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_MS,
    DEFAULT_MAX_CONCURRENCY, DEFAULT_PAGE_SIZE,
};
use crate::constants::usage::{ARTIFACT_CREATE_COST, NOTIFICATION_COST, QUERY_PAGE_COST};
use crate::errors::PipelineError;

/// Per-unit retry budget and backoff schedule.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Attempts per unit, first attempt included. Must be at least 1.
    pub max_attempts: u32,
    /// Pause before the second attempt; doubled for each later attempt.
    pub initial_backoff: Duration,
    /// Ceiling applied to the doubled pause.
    pub max_backoff: Duration,
    /// Randomize each pause within `[pause / 2, pause]`.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Policy with `max_attempts` attempts and no pauses between them.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: false,
        }
    }

    /// Un-jittered pause taken after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(16);
        let scaled = self.initial_backoff.saturating_mul(1u32 << exponent);
        scaled.min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            jitter: true,
        }
    }
}

/// Worker pool sizing and retry behavior for the scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum number of map or reduce units running at once.
    pub max_concurrency: usize,
    /// Retry budget applied to every map and reduce unit.
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

/// How report fields containing separators or quotes are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FieldEscaping {
    /// Write field text as-is. A comma inside a customer name shifts columns.
    #[default]
    Verbatim,
    /// Quote fields containing `,`, `"`, CR or LF and double embedded quotes.
    Quoted,
}

/// Report artifact rendering options.
#[derive(Clone, Debug, Default)]
pub struct ReportConfig {
    /// Escaping applied to header and data fields.
    pub escaping: FieldEscaping,
}

/// Sender, mailbox, and message text used by the reduce stage.
#[derive(Clone, Debug)]
pub struct NotificationConfig {
    /// Identity notifications are sent on behalf of.
    pub sender: Cow<'static, str>,
    /// Mailbox that receives the report for unassigned customers.
    pub admin_mailbox: Cow<'static, str>,
    /// Subject shared by every notification.
    pub subject: Cow<'static, str>,
    /// Body for the admin partition.
    pub admin_body: Cow<'static, str>,
    /// Body for sales representative partitions.
    pub rep_body: Cow<'static, str>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sender: Cow::Borrowed(DEFAULT_SENDER),
            admin_mailbox: Cow::Borrowed(DEFAULT_ADMIN_MAILBOX),
            subject: Cow::Borrowed(DEFAULT_SUBJECT),
            admin_body: Cow::Borrowed(DEFAULT_ADMIN_BODY),
            rep_body: Cow::Borrowed(DEFAULT_REP_BODY),
        }
    }
}

/// Usage units charged per external interface call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UsageCosts {
    /// Cost of fetching one query page.
    pub query_page: u64,
    /// Cost of creating one artifact.
    pub artifact_create: u64,
    /// Cost of dispatching one notification.
    pub notification: u64,
}

impl Default for UsageCosts {
    fn default() -> Self {
        Self {
            query_page: QUERY_PAGE_COST,
            artifact_create: ARTIFACT_CREATE_COST,
            notification: NOTIFICATION_COST,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Job name mixed into run ids (and therefore ledger entries).
    pub job_name: Cow<'static, str>,
    /// Rows requested per record-store page.
    pub page_size: usize,
    /// Worker pool and retry settings.
    pub scheduler: SchedulerConfig,
    /// Recipient and message settings.
    pub notification: NotificationConfig,
    /// Artifact rendering settings.
    pub report: ReportConfig,
    /// Usage accounting costs.
    pub usage: UsageCosts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            job_name: Cow::Borrowed(DEFAULT_JOB_NAME),
            page_size: DEFAULT_PAGE_SIZE,
            scheduler: SchedulerConfig::default(),
            notification: NotificationConfig::default(),
            report: ReportConfig::default(),
            usage: UsageCosts::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject settings the scheduler or enumerator cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.job_name.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "job_name must not be empty".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(PipelineError::Configuration(
                "page_size must be greater than zero".into(),
            ));
        }
        if self.scheduler.max_concurrency == 0 {
            return Err(PipelineError::Configuration(
                "max_concurrency must be greater than zero".into(),
            ));
        }
        if self.scheduler.retry.max_attempts == 0 {
            return Err(PipelineError::Configuration(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.notification.admin_mailbox.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "admin_mailbox must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_attempts_and_zero_concurrency_are_rejected() {
        let mut config = PipelineConfig::default();
        config.scheduler.retry.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Configuration(_))
        ));

        let mut config = PipelineConfig::default();
        config.scheduler.max_concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Configuration(_))
        ));

        let mut config = PipelineConfig::default();
        config.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            jitter: false,
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_for(30), Duration::from_millis(350));
        assert_eq!(RetryPolicy::immediate(3).backoff_for(2), Duration::ZERO);
    }
}
