//! Per-target state and lifecycle rules.
//!
//! A [`TargetState`] is the registry's cumulative record for one identity.
//! Reports are merged field by field: a present field overwrites the stored
//! value, an absent field leaves it alone. Phase transitions happen here but
//! are only ever driven by the registry's apply and sweep paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::route::IntendedRoute;
use crate::types::{
    AtonData, Position, SartStatus, StaticData, TargetIdentity, TargetKind, TargetPhase,
    TargetReport,
};

/// Display settings of a vessel target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselSettings {
    /// Draw the intended route when the vessel has one
    pub show_route: bool,
    /// Draw the name label next to the vessel
    pub show_name_label: bool,
}

impl Default for VesselSettings {
    fn default() -> Self {
        Self {
            show_route: true,
            show_name_label: true,
        }
    }
}

/// Vessel-only extension data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VesselData {
    pub route: IntendedRoute,
    pub settings: VesselSettings,
}

/// Search-and-rescue extension data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SarData {
    pub status: Option<SartStatus>,
}

/// Kind-specific extension data, owned by the target and dropped with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KindData {
    Vessel(VesselData),
    AidToNavigation(AtonData),
    SearchAndRescue(SarData),
}

impl KindData {
    /// Empty extension data for a kind.
    pub fn for_kind(kind: TargetKind) -> Self {
        match kind {
            TargetKind::Vessel => KindData::Vessel(VesselData::default()),
            TargetKind::AidToNavigation => KindData::AidToNavigation(AtonData::default()),
            TargetKind::SearchAndRescue => KindData::SearchAndRescue(SarData::default()),
        }
    }
}

/// What merging a report changed beyond the plain fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Phase before the merge, if it differs from the phase after it
    pub previous_phase: Option<TargetPhase>,
    /// A vessel with route display enabled gained its first waypoints
    pub route_became_visible: bool,
}

/// The registry's record for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetState {
    pub identity: TargetIdentity,
    pub kind: TargetKind,
    pub phase: TargetPhase,
    pub position: Option<Position>,
    pub course: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub static_data: StaticData,
    pub first_seen: DateTime<Utc>,
    /// Source timestamp of the newest accepted report
    pub last_update: DateTime<Utc>,
    /// Number of accepted reports
    pub report_count: u64,
    pub data: KindData,
}

impl TargetState {
    /// Creates the state for a previously unknown identity.
    pub fn from_report(report: &TargetReport) -> Self {
        let mut state = Self {
            identity: report.identity,
            kind: report.kind,
            phase: TargetPhase::Provisional,
            position: None,
            course: None,
            speed: None,
            heading: None,
            static_data: StaticData::default(),
            first_seen: report.timestamp,
            last_update: report.timestamp,
            report_count: 0,
            data: KindData::for_kind(report.kind),
        };
        state.merge_report(report);
        state
    }

    /// Returns true if `timestamp` predates the newest accepted report.
    pub fn is_newer_than(&self, timestamp: DateTime<Utc>) -> bool {
        self.last_update > timestamp
    }

    /// Merges an accepted report into this state.
    ///
    /// The caller guarantees the report is for this identity and kind and is
    /// not older than `last_update`.
    pub fn merge_report(&mut self, report: &TargetReport) -> MergeOutcome {
        debug_assert_eq!(report.identity, self.identity);
        debug_assert_eq!(report.kind, self.kind);

        let phase_before = self.phase;
        let route_visible_before = self.route_visible();

        if report.timestamp > self.last_update {
            self.last_update = report.timestamp;
        }
        self.report_count += 1;

        if let Some(position) = report.position {
            self.position = Some(position);
        }
        if let Some(course) = report.course {
            self.course = Some(course);
        }
        if let Some(speed) = report.speed {
            self.speed = Some(speed);
        }
        if let Some(heading) = report.heading {
            self.heading = Some(heading);
        }
        if let Some(static_data) = &report.static_data {
            self.static_data.merge(static_data);
        }

        self.merge_kind_data(report);

        // Any accepted report revives a stale target
        self.phase = self.live_phase();

        MergeOutcome {
            previous_phase: (phase_before != self.phase).then_some(phase_before),
            route_became_visible: !route_visible_before && self.route_visible(),
        }
    }

    fn merge_kind_data(&mut self, report: &TargetReport) {
        match &mut self.data {
            KindData::Vessel(vessel) => {
                if let Some(fragment) = &report.route {
                    vessel.route.merge(fragment, report.timestamp);
                }
            }
            KindData::AidToNavigation(aton) => {
                if let Some(update) = &report.aton {
                    aton.merge(update);
                }
            }
            KindData::SearchAndRescue(sar) => {
                if let Some(status) = report.sart_status {
                    sar.status = Some(status);
                }
            }
        }

        if report.route.is_some() && self.kind != TargetKind::Vessel {
            debug!(identity = %self.identity, kind = %self.kind, "Dropping route fragment for non-vessel target");
        }
        if report.aton.is_some() && self.kind != TargetKind::AidToNavigation {
            debug!(identity = %self.identity, kind = %self.kind, "Dropping AtoN data for non-AtoN target");
        }
        if report.sart_status.is_some() && self.kind != TargetKind::SearchAndRescue {
            debug!(identity = %self.identity, kind = %self.kind, "Dropping SART status for non-SART target");
        }
    }

    /// Phase a target has while it keeps reporting.
    fn live_phase(&self) -> TargetPhase {
        if self.position.is_some() {
            TargetPhase::Active
        } else {
            TargetPhase::Provisional
        }
    }

    /// Marks the target stale. Returns true if the phase changed.
    pub fn mark_stale(&mut self) -> bool {
        match self.phase {
            TargetPhase::Provisional | TargetPhase::Active => {
                self.phase = TargetPhase::Stale;
                true
            }
            TargetPhase::Stale | TargetPhase::Gone => false,
        }
    }

    /// Moves the target to its terminal phase.
    pub fn mark_gone(&mut self) {
        self.phase = TargetPhase::Gone;
    }

    pub fn intended_route(&self) -> Option<&IntendedRoute> {
        match &self.data {
            KindData::Vessel(vessel) => Some(&vessel.route),
            _ => None,
        }
    }

    pub fn has_intended_route(&self) -> bool {
        self.intended_route().is_some_and(|route| !route.is_empty())
    }

    pub fn vessel_settings(&self) -> Option<&VesselSettings> {
        match &self.data {
            KindData::Vessel(vessel) => Some(&vessel.settings),
            _ => None,
        }
    }

    /// Replaces the vessel display settings.
    ///
    /// Returns `None` for non-vessel targets, otherwise whether the visible
    /// route changed as a result.
    pub fn set_vessel_settings(&mut self, settings: VesselSettings) -> Option<bool> {
        let visible_before = self.route_visible();
        match &mut self.data {
            KindData::Vessel(vessel) => vessel.settings = settings,
            _ => return None,
        }
        Some(visible_before != self.route_visible())
    }

    /// True if a route exists and the vessel is set to show it.
    pub fn route_visible(&self) -> bool {
        match &self.data {
            KindData::Vessel(vessel) => vessel.settings.show_route && !vessel.route.is_empty(),
            _ => false,
        }
    }

    pub fn sart_status(&self) -> Option<SartStatus> {
        match &self.data {
            KindData::SearchAndRescue(sar) => sar.status,
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.static_data.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteFragment;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn vessel(secs: i64) -> TargetReport {
        TargetReport::new(TargetIdentity::new(123_456_789), TargetKind::Vessel, ts(secs))
    }

    #[test]
    fn test_first_report_without_position_is_provisional() {
        let state = TargetState::from_report(&vessel(100).with_name("ARKONA"));
        assert_eq!(state.phase, TargetPhase::Provisional);
        assert_eq!(state.report_count, 1);
        assert_eq!(state.first_seen, ts(100));
    }

    #[test]
    fn test_position_makes_target_active() {
        let mut state = TargetState::from_report(&vessel(100).with_name("ARKONA"));
        let outcome = state.merge_report(&vessel(110).with_position(55.0, 12.0));

        assert_eq!(state.phase, TargetPhase::Active);
        assert_eq!(outcome.previous_phase, Some(TargetPhase::Provisional));
        assert_eq!(state.name(), Some("ARKONA"));
    }

    #[test]
    fn test_partial_merge_keeps_absent_fields() {
        let mut state = TargetState::from_report(
            &vessel(100)
                .with_position(55.0, 12.0)
                .with_course(90.0)
                .with_speed(10.0),
        );
        state.merge_report(&vessel(120).with_speed(0.0));

        assert_eq!(state.position, Some(Position::new(55.0, 12.0)));
        assert_eq!(state.course, Some(90.0));
        assert_eq!(state.speed, Some(0.0));
        assert_eq!(state.last_update, ts(120));
        assert_eq!(state.report_count, 2);
    }

    #[test]
    fn test_stale_target_revives_on_report() {
        let mut state = TargetState::from_report(&vessel(100).with_position(55.0, 12.0));
        assert!(state.mark_stale());
        assert!(!state.mark_stale());

        let outcome = state.merge_report(&vessel(400));
        assert_eq!(state.phase, TargetPhase::Active);
        assert_eq!(outcome.previous_phase, Some(TargetPhase::Stale));
    }

    #[test]
    fn test_route_became_visible() {
        let mut state = TargetState::from_report(&vessel(100).with_position(55.0, 12.0));
        assert!(!state.has_intended_route());

        let outcome = state.merge_report(
            &vessel(110).with_route(RouteFragment::new().with_waypoint(0, 55.1, 12.1)),
        );
        assert!(outcome.route_became_visible);
        assert!(state.has_intended_route());

        let outcome = state.merge_report(
            &vessel(120).with_route(RouteFragment::new().with_waypoint(1, 55.2, 12.2)),
        );
        assert!(!outcome.route_became_visible);
        assert_eq!(state.intended_route().unwrap().len(), 2);
    }

    #[test]
    fn test_route_hidden_by_settings() {
        let mut state = TargetState::from_report(&vessel(100).with_position(55.0, 12.0));
        let changed = state.set_vessel_settings(VesselSettings {
            show_route: false,
            show_name_label: true,
        });
        assert_eq!(changed, Some(false));

        let outcome = state.merge_report(
            &vessel(110).with_route(RouteFragment::new().with_waypoint(0, 55.1, 12.1)),
        );
        assert!(!outcome.route_became_visible);

        let changed = state.set_vessel_settings(VesselSettings::default());
        assert_eq!(changed, Some(true));
        assert!(state.route_visible());
    }

    #[test]
    fn test_kind_specific_fields_ignored_for_other_kinds() {
        let report = TargetReport::new(
            TargetIdentity::new(970_012_345),
            TargetKind::SearchAndRescue,
            ts(100),
        )
        .with_position(56.0, 11.0)
        .with_sart_status(SartStatus::Active)
        .with_route(RouteFragment::new().with_waypoint(0, 56.1, 11.1));

        let state = TargetState::from_report(&report);
        assert_eq!(state.sart_status(), Some(SartStatus::Active));
        assert!(state.intended_route().is_none());
        assert!(state.clone().set_vessel_settings(VesselSettings::default()).is_none());
    }

    #[test]
    fn test_aton_data_merge() {
        let id = TargetIdentity::new(992_191_234);
        let mut state = TargetState::from_report(
            &TargetReport::new(id, TargetKind::AidToNavigation, ts(100))
                .with_position(54.9, 10.5)
                .with_aton(AtonData {
                    aton_type: Some(30),
                    virtual_aton: Some(false),
                    off_position: None,
                }),
        );
        state.merge_report(
            &TargetReport::new(id, TargetKind::AidToNavigation, ts(200)).with_aton(AtonData {
                off_position: Some(true),
                ..Default::default()
            }),
        );

        match &state.data {
            KindData::AidToNavigation(aton) => {
                assert_eq!(aton.aton_type, Some(30));
                assert_eq!(aton.virtual_aton, Some(false));
                assert_eq!(aton.off_position, Some(true));
            }
            other => panic!("unexpected kind data: {:?}", other),
        }
    }

    #[test]
    fn test_is_newer_than() {
        let state = TargetState::from_report(&vessel(100));
        assert!(state.is_newer_than(ts(90)));
        assert!(!state.is_newer_than(ts(100)));
    }
}
