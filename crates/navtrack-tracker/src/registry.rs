//! Target Registry
//!
//! Authoritative map from identity to the cumulative state of each live
//! target. Reports are validated, ordered by source timestamp and merged
//! field by field. Every change publishes exactly one event through the
//! [`ChangeNotifier`]; events are enqueued while the write lock is held so
//! that subscribers see the changes of one identity in the order they were
//! made, but listener code never runs under the lock.

use chrono::{DateTime, Utc};
use navtrack_core::config::TrackerConfig;
use navtrack_core::error::ConfigError;
use navtrack_core::state::VesselSettings;
use navtrack_core::types::RemovalReason;
use navtrack_core::validate::validate_report;
use navtrack_core::{
    ChangeKind, ReportError, Result, TargetIdentity, TargetKind, TargetPhase, TargetReport,
    TargetState,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::metrics::RegistryMetrics;
use crate::names::NameCache;
use crate::notifier::{ChangeNotifier, TargetEvent};

/// Registry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub provisional: usize,
    pub active: usize,
    pub stale: usize,
    pub vessels: usize,
    pub aids_to_navigation: usize,
    pub search_and_rescue: usize,
    /// Vessels with at least one intended-route waypoint
    pub with_route: usize,
}

/// Target Registry
pub struct TargetRegistry {
    targets: RwLock<HashMap<TargetIdentity, TargetState>>,
    notifier: Arc<ChangeNotifier>,
    names: NameCache,
    stale_after: chrono::Duration,
    size_warning_threshold: usize,
    size_warned: AtomicBool,
    metrics: Arc<RegistryMetrics>,
}

impl TargetRegistry {
    /// Creates an empty registry publishing through `notifier`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(config: &TrackerConfig, notifier: Arc<ChangeNotifier>) -> Result<Self> {
        config.validate()?;

        let stale_after = chrono::Duration::from_std(config.stale_after()).map_err(|e| {
            ConfigError::invalid_value("tracker.stale_after_secs", e.to_string())
        })?;

        Ok(Self {
            targets: RwLock::new(HashMap::new()),
            notifier,
            names: NameCache::new(config.name_cache_capacity),
            stale_after,
            size_warning_threshold: config.size_warning_threshold,
            size_warned: AtomicBool::new(false),
            metrics: Arc::new(RegistryMetrics::new()),
        })
    }

    /// Applies one decoded report.
    ///
    /// Malformed reports are rejected with the reason and leave the registry
    /// untouched. Reports older than the stored state, and withdrawals of
    /// unknown targets, return [`ChangeKind::Ignored`]. Neither case is fatal.
    pub fn apply(&self, report: &TargetReport) -> std::result::Result<ChangeKind, ReportError> {
        if let Err(e) = validate_report(report) {
            self.metrics.record_rejected(e.label());
            debug!(identity = %report.identity, error = %e, "Rejected malformed report");
            return Err(e);
        }

        let identity = report.identity;
        let mut targets = self.targets.write();

        let change = match targets.get_mut(&identity) {
            None if report.withdrawn => {
                debug!(identity = %identity, "Ignoring withdrawal of unknown target");
                ChangeKind::Ignored
            }
            None => {
                let state = self.create_state(report);
                targets.insert(identity, state);
                ChangeKind::Created
            }
            Some(existing) if existing.is_newer_than(report.timestamp) => {
                debug!(
                    identity = %identity,
                    report_time = %report.timestamp,
                    last_update = %existing.last_update,
                    "Ignoring report older than stored state"
                );
                ChangeKind::Ignored
            }
            Some(_) if report.withdrawn => {
                if let Some(mut state) = targets.remove(&identity) {
                    state.mark_gone();
                }
                self.publish_removed(identity, RemovalReason::Withdrawn);
                ChangeKind::Removed
            }
            Some(existing) if existing.kind != report.kind => {
                info!(
                    identity = %identity,
                    old_kind = %existing.kind,
                    new_kind = %report.kind,
                    "Target changed kind, replacing"
                );
                if let Some(mut state) = targets.remove(&identity) {
                    state.mark_gone();
                }
                self.publish_removed(identity, RemovalReason::KindChanged);

                let state = self.create_state(report);
                targets.insert(identity, state);
                ChangeKind::Created
            }
            Some(existing) => {
                let outcome = existing.merge_report(report);
                if let Some(previous) = outcome.previous_phase {
                    debug!(
                        identity = %identity,
                        from = %previous,
                        to = %existing.phase,
                        "Target phase changed"
                    );
                }
                self.metrics.record_updated();
                self.notifier.publish(TargetEvent::Updated {
                    state: Arc::new(existing.clone()),
                    force_refresh: outcome.route_became_visible,
                });
                ChangeKind::Updated
            }
        };

        // Under the lock so the cache never ends up behind the stored name
        if matches!(change, ChangeKind::Created | ChangeKind::Updated) {
            if let Some(name) = report
                .static_data
                .as_ref()
                .and_then(|data| data.name.as_deref())
            {
                self.names.remember(identity, name);
            }
        }

        let len = targets.len();
        drop(targets);

        match change {
            ChangeKind::Ignored => self.metrics.record_ignored(),
            _ => {
                self.metrics.record_applied();
                self.track_size(len);
            }
        }

        Ok(change)
    }

    /// Builds the state of a new target and publishes its creation.
    ///
    /// Called with the write lock held.
    fn create_state(&self, report: &TargetReport) -> TargetState {
        let mut state = TargetState::from_report(report);

        if state.kind == TargetKind::Vessel && state.name().is_none() {
            if let Some(name) = self.names.lookup(state.identity) {
                debug!(identity = %state.identity, name = %name, "Seeding name from cache");
                state.static_data.name = Some(name);
            }
        }

        debug!(identity = %state.identity, kind = %state.kind, phase = %state.phase, "Target created");

        self.metrics.record_created();
        self.notifier.publish(TargetEvent::Created {
            state: Arc::new(state.clone()),
        });
        state
    }

    fn publish_removed(&self, identity: TargetIdentity, reason: RemovalReason) {
        debug!(identity = %identity, reason = %reason, "Target removed");
        self.metrics.record_removed(match reason {
            RemovalReason::Withdrawn => "withdrawn",
            RemovalReason::Expired => "expired",
            RemovalReason::KindChanged => "kind_changed",
        });
        self.notifier.publish(TargetEvent::Removed { identity, reason });
    }

    /// Removes every target silent for longer than `timeout` as of `now`.
    ///
    /// Each removed target moves to [`TargetPhase::Gone`] and produces one
    /// Removed event. Targets silent for longer than the configured stale
    /// interval, but not yet expired, are marked stale with one Updated event
    /// per phase change. Returns the removed identities in ascending order.
    pub fn sweep(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<TargetIdentity> {
        let expire_before = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|timeout| now.checked_sub_signed(timeout));
        let stale_before = now.checked_sub_signed(self.stale_after);

        let mut targets = self.targets.write();

        let mut expired: Vec<TargetIdentity> = match expire_before {
            Some(cutoff) => targets
                .values()
                .filter(|state| state.last_update < cutoff)
                .map(|state| state.identity)
                .collect(),
            None => Vec::new(),
        };
        expired.sort_unstable();

        for identity in &expired {
            if let Some(mut state) = targets.remove(identity) {
                state.mark_gone();
                self.publish_removed(*identity, RemovalReason::Expired);
            }
        }

        if let Some(cutoff) = stale_before {
            let mut stale: Vec<TargetIdentity> = targets
                .values()
                .filter(|state| {
                    state.last_update < cutoff
                        && matches!(state.phase, TargetPhase::Provisional | TargetPhase::Active)
                })
                .map(|state| state.identity)
                .collect();
            stale.sort_unstable();

            for identity in stale {
                if let Some(state) = targets.get_mut(&identity) {
                    if state.mark_stale() {
                        debug!(identity = %identity, "Target marked stale");
                        self.metrics.record_marked_stale();
                        self.notifier.publish(TargetEvent::Updated {
                            state: Arc::new(state.clone()),
                            force_refresh: false,
                        });
                    }
                }
            }
        }

        let len = targets.len();
        drop(targets);

        if !expired.is_empty() {
            info!(removed = expired.len(), remaining = len, "Expired silent targets");
        }
        self.track_size(len);

        expired
    }

    /// Changes the display settings of a vessel.
    ///
    /// Returns false if the identity is unknown or not a vessel. A change
    /// that shows or hides an existing intended route requests a forced
    /// refresh.
    pub fn update_vessel_settings(&self, identity: TargetIdentity, settings: VesselSettings) -> bool {
        let mut targets = self.targets.write();

        let Some(state) = targets.get_mut(&identity) else {
            return false;
        };

        match state.vessel_settings() {
            None => return false,
            Some(current) if *current == settings => return true,
            Some(_) => {}
        }

        let visibility_changed = state.set_vessel_settings(settings).unwrap_or(false);

        debug!(
            identity = %identity,
            show_route = settings.show_route,
            show_name_label = settings.show_name_label,
            "Vessel settings changed"
        );

        self.metrics.record_updated();
        self.notifier.publish(TargetEvent::Updated {
            state: Arc::new(state.clone()),
            force_refresh: visibility_changed,
        });

        true
    }

    pub fn get(&self, identity: TargetIdentity) -> Option<TargetState> {
        self.targets.read().get(&identity).cloned()
    }

    /// Point-in-time copy of every target, ordered by identity.
    pub fn snapshot(&self) -> Vec<TargetState> {
        let mut states: Vec<TargetState> = self.targets.read().values().cloned().collect();
        states.sort_unstable_by_key(|state| state.identity);
        states
    }

    pub fn contains(&self, identity: TargetIdentity) -> bool {
        self.targets.read().contains_key(&identity)
    }

    pub fn len(&self) -> usize {
        self.targets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.read().is_empty()
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        let targets = self.targets.read();
        let mut stats = RegistryStats {
            total: targets.len(),
            ..Default::default()
        };

        for state in targets.values() {
            match state.phase {
                TargetPhase::Provisional => stats.provisional += 1,
                TargetPhase::Active => stats.active += 1,
                TargetPhase::Stale => stats.stale += 1,
                TargetPhase::Gone => {}
            }
            match state.kind {
                TargetKind::Vessel => stats.vessels += 1,
                TargetKind::AidToNavigation => stats.aids_to_navigation += 1,
                TargetKind::SearchAndRescue => stats.search_and_rescue += 1,
            }
            if state.has_intended_route() {
                stats.with_route += 1;
            }
        }

        stats
    }

    /// Names learned from static data, kept across removals.
    pub fn names(&self) -> &NameCache {
        &self.names
    }

    pub fn notifier(&self) -> Arc<ChangeNotifier> {
        Arc::clone(&self.notifier)
    }

    /// Get registry metrics
    pub fn metrics(&self) -> Arc<RegistryMetrics> {
        Arc::clone(&self.metrics)
    }

    fn track_size(&self, len: usize) {
        self.metrics.set_target_count(len);

        if len > self.size_warning_threshold {
            if !self.size_warned.swap(true, Ordering::Relaxed) {
                warn!(
                    targets = len,
                    threshold = self.size_warning_threshold,
                    "Target registry exceeds size warning threshold"
                );
            }
        } else if len < self.size_warning_threshold
            && self.size_warned.swap(false, Ordering::Relaxed)
        {
            info!(
                targets = len,
                threshold = self.size_warning_threshold,
                "Target registry back below size warning threshold"
            );
        }
    }
}
