//! Call-outcome accounting for the loupe client
//!
//! One outcome is recorded per logical call; the `attempts` counter tracks
//! physical attempts separately so retries never inflate the success/failure
//! totals. Recording can neither fail nor alter the call it observes.

use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    calls_succeeded: u64,
    calls_failed: u64,
    attempts: u64,
    session_resets: u64,
    total_latency: Duration,
    last_error: Option<String>,
}

/// Instance-local metrics, updated only from the owning client's call paths.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

/// Immutable view of the counters at one point in time.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    /// Logical calls that resolved successfully
    pub calls_succeeded: u64,
    /// Logical calls that ended in an error after classification/retries
    pub calls_failed: u64,
    /// Physical attempts, including retries
    pub attempts: u64,
    /// Times the session token was discarded and re-acquired
    pub session_resets: u64,
    /// Total latency across successful calls, in milliseconds
    pub total_latency_ms: u64,
    /// Average latency per successful call, in milliseconds
    pub avg_latency_ms: f64,
    /// Message of the most recent terminal error
    pub last_error: Option<String>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, latency: Duration) {
        let mut inner = self.inner.lock();
        inner.calls_succeeded += 1;
        inner.total_latency += latency;
    }

    pub fn record_failure(&self, error: &str) {
        let mut inner = self.inner.lock();
        inner.calls_failed += 1;
        inner.last_error = Some(error.to_string());
    }

    pub fn record_attempt(&self) {
        self.inner.lock().attempts += 1;
    }

    pub fn record_session_reset(&self) {
        self.inner.lock().session_resets += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        let total_latency_ms = inner.total_latency.as_millis() as u64;
        let avg_latency_ms = if inner.calls_succeeded > 0 {
            total_latency_ms as f64 / inner.calls_succeeded as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            calls_succeeded: inner.calls_succeeded,
            calls_failed: inner.calls_failed,
            attempts: inner.attempts,
            session_resets: inner.session_resets,
            total_latency_ms,
            avg_latency_ms,
            last_error: inner.last_error.clone(),
        }
    }

    /// Zero every counter. Session and retry state are untouched.
    pub fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_accounting() {
        let metrics = MetricsCollector::new();
        metrics.record_attempt();
        metrics.record_success(Duration::from_millis(20));
        metrics.record_attempt();
        metrics.record_success(Duration::from_millis(40));

        let snap = metrics.snapshot();
        assert_eq!(snap.calls_succeeded, 2);
        assert_eq!(snap.attempts, 2);
        assert_eq!(snap.total_latency_ms, 60);
        assert!((snap.avg_latency_ms - 30.0).abs() < f64::EPSILON);
        assert_eq!(snap.calls_failed, 0);
    }

    #[test]
    fn test_failure_keeps_last_error() {
        let metrics = MetricsCollector::new();
        metrics.record_failure("connection failed: refused");
        metrics.record_failure("request timed out after 5s");

        let snap = metrics.snapshot();
        assert_eq!(snap.calls_failed, 2);
        assert_eq!(
            snap.last_error.as_deref(),
            Some("request timed out after 5s")
        );
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let metrics = MetricsCollector::new();
        metrics.record_attempt();
        metrics.record_success(Duration::from_millis(5));
        metrics.record_session_reset();
        metrics.reset();

        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let metrics = MetricsCollector::new();
        metrics.record_success(Duration::from_millis(5));
        let snap = metrics.snapshot();
        metrics.record_success(Duration::from_millis(5));
        assert_eq!(snap.calls_succeeded, 1);
    }
}
