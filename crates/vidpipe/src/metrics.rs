use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::error::Stage;

/// Bring-up timing and call counters.
///
/// Cheap to clone; clones share the same counters.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use vidpipe::prelude::*;
///
/// let metrics = BringupMetrics::default();
/// metrics.record(Stage::Gamma, Duration::from_micros(250));
/// metrics.record(Stage::Gamma, Duration::from_micros(250));
/// assert_eq!(metrics.last(Stage::Gamma), Some(Duration::from_micros(500)));
/// assert_eq!(metrics.last(Stage::Power), None);
/// ```
#[derive(Default, Clone)]
pub struct BringupMetrics {
    inner: Arc<MetricsState>,
}

#[derive(Default)]
struct MetricsState {
    init_attempts: AtomicU64,
    init_failures: AtomicU64,
    start_calls: AtomicU64,
    stage_nanos: Mutex<HashMap<Stage, u64>>,
}

impl BringupMetrics {
    /// Add `dur` to the time spent in `stage` during the current run.
    pub fn record(&self, stage: Stage, dur: Duration) {
        let nanos = dur.as_nanos().min(u64::MAX as u128) as u64;
        if let Ok(mut stages) = self.inner.stage_nanos.lock() {
            let total = stages.entry(stage).or_default();
            *total = total.saturating_add(nanos);
        }
    }

    /// Time spent in `stage` during the most recent run that reached it.
    pub fn last(&self, stage: Stage) -> Option<Duration> {
        self.inner
            .stage_nanos
            .lock()
            .ok()
            .and_then(|s| s.get(&stage).copied())
            .map(Duration::from_nanos)
    }

    pub fn last_millis(&self, stage: Stage) -> Option<f64> {
        self.last(stage).map(|d| d.as_nanos() as f64 / 1_000_000.0)
    }

    pub fn init_attempts(&self) -> u64 {
        self.inner.init_attempts.load(Ordering::Relaxed)
    }

    pub fn init_failures(&self) -> u64 {
        self.inner.init_failures.load(Ordering::Relaxed)
    }

    /// Every `start()` call, including ones rejected before touching hardware.
    pub fn start_calls(&self) -> u64 {
        self.inner.start_calls.load(Ordering::Relaxed)
    }

    /// Forget timings for `stages` ahead of a new run.
    pub(crate) fn reset(&self, stages: &[Stage]) {
        if let Ok(mut recorded) = self.inner.stage_nanos.lock() {
            for stage in stages {
                recorded.remove(stage);
            }
        }
    }

    pub(crate) fn note_init(&self) {
        self.inner.init_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_init_failure(&self) {
        self.inner.init_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_start(&self) {
        self.inner.start_calls.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for BringupMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BringupMetrics")
            .field("init_attempts", &self.init_attempts())
            .field("init_failures", &self.init_failures())
            .field("start_calls", &self.start_calls())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_only_touches_named_stages() {
        let metrics = BringupMetrics::default();
        metrics.record(Stage::Power, Duration::from_millis(1));
        metrics.record(Stage::Stream, Duration::from_millis(2));
        metrics.reset(&[Stage::Power]);
        assert_eq!(metrics.last(Stage::Power), None);
        assert_eq!(metrics.last_millis(Stage::Stream), Some(2.0));
    }

    #[test]
    fn clones_share_counters() {
        let metrics = BringupMetrics::default();
        let view = metrics.clone();
        metrics.note_init();
        metrics.note_init_failure();
        metrics.note_start();
        metrics.note_start();
        assert_eq!(view.init_attempts(), 1);
        assert_eq!(view.init_failures(), 1);
        assert_eq!(view.start_calls(), 2);
    }
}
