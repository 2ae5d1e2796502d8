//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use navtrack_core::config::TrackerConfig;
use navtrack_core::types::ChangeKind;
use navtrack_core::{TargetIdentity, TargetKind, TargetReport};
use navtrack_tracker::{ChangeNotifier, TargetEvent, TargetListener, TargetRegistry};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// Get the path to test fixtures
pub fn fixtures_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir).join("tests").join("fixtures")
}

/// Load the sample JSON-line reports, one entry per line, blank lines kept.
pub fn load_fixture_lines() -> Vec<String> {
    let path = fixtures_dir().join("reports.jsonl");
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("Failed to read report fixture from {:?}", path));
    content.lines().map(str::to_string).collect()
}

/// Source timestamp `secs` seconds after the epoch.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Vessel report carrying only identity and time.
pub fn vessel(identity: u32, secs: i64) -> TargetReport {
    TargetReport::new(TargetIdentity::new(identity), TargetKind::Vessel, ts(secs))
}

/// Tracker settings with short intervals: 30 s expiry, 20 s stale.
pub fn test_tracker_config() -> TrackerConfig {
    TrackerConfig {
        expiry_timeout_secs: 30,
        stale_after_secs: 20,
        sweep_interval_secs: 1,
        ..Default::default()
    }
}

/// Registry wired to a fresh notifier.
pub fn create_registry() -> (Arc<ChangeNotifier>, Arc<TargetRegistry>) {
    let notifier = Arc::new(ChangeNotifier::new());
    let registry = Arc::new(
        TargetRegistry::new(&test_tracker_config(), Arc::clone(&notifier))
            .expect("Failed to create registry"),
    );
    (notifier, registry)
}

/// Listener that records every event it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<TargetEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<TargetEvent> {
        self.events.lock().clone()
    }

    /// (identity, change) pairs in delivery order.
    pub fn changes(&self) -> Vec<(TargetIdentity, ChangeKind)> {
        self.events
            .lock()
            .iter()
            .map(|event| (event.identity(), event.change()))
            .collect()
    }

    pub fn count(&self, change: ChangeKind) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.change() == change)
            .count()
    }
}

impl TargetListener for RecordingListener {
    fn on_event(&self, event: &TargetEvent) -> anyhow::Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
