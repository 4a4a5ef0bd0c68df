//! Live station status shared between the pipeline, the reporting worker and
//! the HTTP status routes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Observation;

// ---

#[derive(Debug, Default)]
pub struct StationStatus {
    pub ticks: AtomicU64,
    pub sampling: AtomicBool,
    pub observations_logged: AtomicU64,
    pub report_failures: AtomicU64,
    pub reports_dropped: AtomicU64,
    started_at: Mutex<Option<DateTime<Utc>>>,
    last_observation: Mutex<Option<Observation>>,
    last_error: Mutex<Option<String>>,
}

/// Point-in-time copy of [`StationStatus`] for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: &'static str,
    pub started_at: Option<DateTime<Utc>>,
    pub ticks: u64,
    pub observations_logged: u64,
    pub report_failures: u64,
    pub reports_dropped: u64,
    pub last_error: Option<String>,
    pub last_observation: Option<Observation>,
}

impl StationStatus {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_start(&self, time: DateTime<Utc>) {
        // ---
        self.sampling.store(true, Ordering::Relaxed);
        if let Ok(mut guard) = self.started_at.lock() {
            *guard = Some(time);
        }
    }

    pub fn record_logged(&self, observation: &Observation) {
        // ---
        self.observations_logged.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_observation.lock() {
            *guard = Some(observation.clone());
        }
    }

    pub fn record_failure(&self, err: impl Into<String>) {
        // ---
        self.report_failures.fetch_add(1, Ordering::Relaxed);
        self.record_error(err);
    }

    pub fn record_dropped(&self, err: impl Into<String>) {
        // ---
        self.reports_dropped.fetch_add(1, Ordering::Relaxed);
        self.record_error(err);
    }

    fn record_error(&self, err: impl Into<String>) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(err.into());
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        // ---
        let sampling = self.sampling.load(Ordering::Relaxed);
        StatusSnapshot {
            state: if sampling { "sampling" } else { "idle" },
            started_at: self.started_at.lock().ok().and_then(|g| *g),
            ticks: self.ticks.load(Ordering::Relaxed),
            observations_logged: self.observations_logged.load(Ordering::Relaxed),
            report_failures: self.report_failures.load(Ordering::Relaxed),
            reports_dropped: self.reports_dropped.load(Ordering::Relaxed),
            last_error: self.last_error.lock().ok().and_then(|g| g.clone()),
            last_observation: self.last_observation.lock().ok().and_then(|g| g.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snapshot_tracks_lifecycle() {
        // ---
        let status = StationStatus::new();
        assert_eq!(status.snapshot().state, "idle");

        let t = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        status.record_tick();
        status.record_start(t);
        status.record_logged(&Observation::empty(t));
        status.record_failure("db down");
        status.record_dropped("queue full");

        let snap = status.snapshot();
        assert_eq!(snap.state, "sampling");
        assert_eq!(snap.started_at, Some(t));
        assert_eq!(snap.ticks, 1);
        assert_eq!(snap.observations_logged, 1);
        assert_eq!(snap.report_failures, 1);
        assert_eq!(snap.reports_dropped, 1);
        assert_eq!(snap.last_error.as_deref(), Some("queue full"));
        assert_eq!(snap.last_observation.map(|o| o.time), Some(t));
    }
}
