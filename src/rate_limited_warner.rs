//! Rate limiting for data-loss warnings.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default interval between warnings about discarded batches.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Accumulates discarded-record counts and reports them at most once per
/// interval.
///
/// [`record_drops`](Self::record_drops) adds to the pending count;
/// [`warn_if_due`](Self::warn_if_due) hands the pending count to a callback
/// once the interval has passed since the last report. The first report is
/// never delayed. [`flush`](Self::flush) reports whatever is pending
/// regardless of the interval.
#[derive(Debug)]
pub struct RateLimitedWarner {
    interval: Duration,
    /// Unix seconds of the last report, or `NEVER`.
    last_report: AtomicU64,
    pending: AtomicU64,
}

const NEVER: u64 = u64::MAX;

impl Default for RateLimitedWarner {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_INTERVAL)
    }
}

impl RateLimitedWarner {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: AtomicU64::new(NEVER),
            pending: AtomicU64::new(0),
        }
    }

    pub fn record_drops(&self, count: u64) {
        self.pending.fetch_add(count, Ordering::Relaxed);
    }

    /// Report pending drops through `report` if the interval has elapsed.
    pub fn warn_if_due(&self, report: impl FnOnce(u64)) {
        let now = now_secs();
        let last = self.last_report.load(Ordering::Relaxed);
        let due = last == NEVER || now.saturating_sub(last) >= self.interval.as_secs();
        if due {
            self.report_pending(now, report);
        }
    }

    /// Report pending drops immediately.
    pub fn flush(&self, report: impl FnOnce(u64)) {
        self.report_pending(now_secs(), report);
    }

    fn report_pending(&self, now: u64, report: impl FnOnce(u64)) {
        let count = self.pending.swap(0, Ordering::Relaxed);
        if count > 0 {
            report(count);
            self.last_report.store(now, Ordering::Relaxed);
        }
    }
}
