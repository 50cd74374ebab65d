use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Accumulates usage units charged by interface calls during one run.
#[derive(Debug, Default)]
pub struct UsageMeter {
    units: AtomicU64,
}

impl UsageMeter {
    /// Create an empty meter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `units` to the running total.
    pub fn charge(&self, units: u64) {
        self.units.fetch_add(units, Ordering::Relaxed);
    }

    /// Units charged so far.
    pub fn total(&self) -> u64 {
        self.units.load(Ordering::Relaxed)
    }
}

/// Tracks units currently running and the highest count observed.
#[derive(Debug, Default)]
pub(crate) struct ConcurrencyGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    /// Mark a unit as running until the returned guard drops.
    pub(crate) fn enter(&self) -> ActiveUnit<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ActiveUnit { gauge: self }
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Guard returned by `ConcurrencyGauge::enter`.
pub(crate) struct ActiveUnit<'a> {
    gauge: &'a ConcurrencyGauge,
}

impl Drop for ActiveUnit<'_> {
    fn drop(&mut self) {
        self.gauge.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Retry and yield counters shared by every unit of a run.
#[derive(Debug, Default)]
pub(crate) struct RetryCounters {
    retries: AtomicU64,
    yields: AtomicU64,
}

impl RetryCounters {
    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_yield(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub(crate) fn yields(&self) -> u64 {
        self.yields.load(Ordering::Relaxed)
    }
}

/// Scheduler-reported statistics for one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Usage units charged by interface calls.
    pub usage_units: u64,
    /// Wall-clock seconds from input start to the end of the reduce stage.
    pub elapsed_seconds: f64,
    /// Peak number of units observed running at once.
    pub concurrency: usize,
    /// Backoff pauses taken between attempts.
    pub yields: u64,
    /// Re-attempts across all map and reduce units.
    pub retries: u64,
}
