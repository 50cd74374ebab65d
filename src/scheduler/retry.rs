use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::stats::RetryCounters;
use crate::config::RetryPolicy;
use crate::errors::PipelineError;
use crate::types::LogMessage;

/// Outcome of running one unit under a retry policy.
#[derive(Debug)]
pub(crate) struct Attempted<T> {
    pub(crate) result: Result<T, PipelineError>,
    pub(crate) attempts: u32,
    /// Messages of every failed attempt, in order (including ones later recovered).
    pub(crate) errors: Vec<LogMessage>,
}

/// Run `unit` until it succeeds, returns a fatal error, or exhausts the policy.
///
/// `unit` receives the 1-based attempt number. Each pause between attempts
/// counts as a yield; each re-attempt counts as a retry.
pub(crate) fn run_with_retry<T>(
    policy: &RetryPolicy,
    counters: &RetryCounters,
    label: &str,
    mut unit: impl FnMut(u32) -> Result<T, PipelineError>,
) -> Attempted<T> {
    let max_attempts = policy.max_attempts.max(1);
    let mut errors = Vec::new();
    let mut attempt = 1;
    loop {
        match unit(attempt) {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                    errors,
                };
            }
            Err(err) => {
                errors.push(err.to_string());
                if err.is_fatal() || attempt >= max_attempts {
                    return Attempted {
                        result: Err(err),
                        attempts: attempt,
                        errors,
                    };
                }
                debug!(
                    unit = label,
                    attempt,
                    max_attempts,
                    error = %err,
                    "unit attempt failed; retrying"
                );
                pause(policy, attempt, counters);
                counters.record_retry();
                attempt += 1;
            }
        }
    }
}

fn pause(policy: &RetryPolicy, attempt: u32, counters: &RetryCounters) {
    let base = policy.backoff_for(attempt);
    if base.is_zero() {
        return;
    }
    let wait = if policy.jitter {
        let max_ms = base.as_millis() as u64;
        let min_ms = max_ms / 2;
        Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
    } else {
        base
    };
    counters.record_yield();
    thread::sleep(wait);
}
