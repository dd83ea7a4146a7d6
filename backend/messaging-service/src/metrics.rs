//! Prometheus counters for best-effort realtime delivery and the presence sweep
//!
//! Both paths swallow failures, so these counters are where they show up.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

/// Realtime publish attempts by event name and outcome (ok/error/timeout)
static REALTIME_PUBLISH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "messaging_realtime_publish_total",
        "Realtime publish attempts by event and result",
        &["event", "result"]
    )
    .expect("failed to register messaging_realtime_publish_total")
});

/// Presence sweep cycles (success/error)
static PRESENCE_SWEEP_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "messaging_presence_sweep_runs_total",
        "Total number of stale presence sweeps (success/error)",
        &["status"]
    )
    .expect("failed to register messaging_presence_sweep_runs_total")
});

/// Users flipped offline by a sweep
static PRESENCE_SWEEP_FLIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "messaging_presence_sweep_flipped_total",
        "Total online records marked offline by the presence sweep"
    )
    .expect("failed to register messaging_presence_sweep_flipped_total")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishResult {
    Ok,
    Error,
    Timeout,
}

impl PublishResult {
    pub fn as_str(self) -> &'static str {
        match self {
            PublishResult::Ok => "ok",
            PublishResult::Error => "error",
            PublishResult::Timeout => "timeout",
        }
    }
}

/// Record one realtime publish outcome
pub fn record_realtime_publish(event: &str, result: PublishResult) {
    REALTIME_PUBLISH_TOTAL
        .with_label_values(&[event, result.as_str()])
        .inc();
}

/// Record a sweep cycle completion
pub fn record_presence_sweep_run(status: &str) {
    PRESENCE_SWEEP_RUNS_TOTAL.with_label_values(&[status]).inc();
}

/// Record users flipped offline by one sweep
pub fn record_presence_sweep_flipped(count: u64) {
    PRESENCE_SWEEP_FLIPPED_TOTAL.inc_by(count);
}

#[cfg(test)]
pub(crate) fn realtime_publish_count(event: &str, result: PublishResult) -> u64 {
    REALTIME_PUBLISH_TOTAL
        .with_label_values(&[event, result.as_str()])
        .get()
}

#[cfg(test)]
pub(crate) fn presence_sweep_counts() -> (u64, u64) {
    (
        PRESENCE_SWEEP_RUNS_TOTAL.with_label_values(&["success"]).get(),
        PRESENCE_SWEEP_FLIPPED_TOTAL.get(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_outcomes_are_labelled() {
        let before = realtime_publish_count("typing-start", PublishResult::Timeout);
        record_realtime_publish("typing-start", PublishResult::Timeout);
        assert!(realtime_publish_count("typing-start", PublishResult::Timeout) > before);

        let gathered = prometheus::gather();
        assert!(gathered
            .iter()
            .any(|family| family.get_name() == "messaging_realtime_publish_total"));
    }
}
