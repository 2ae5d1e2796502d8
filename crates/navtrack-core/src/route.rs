//! Intended route of a vessel.
//!
//! Route fragment reports carry a subset of the waypoints, keyed by
//! sequence number. Fragments are merged per sequence number and never
//! replace the route wholesale, so a fragment missing the tail does not erase
//! later waypoints that arrived first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Position;

/// Waypoint as carried by a route fragment report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointReport {
    pub sequence: u32,
    pub position: Position,
    /// Estimated time of arrival at this waypoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
}

/// Part of an intended route, as decoded from one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteFragment {
    pub waypoints: Vec<WaypointReport>,
}

impl RouteFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_waypoint(mut self, sequence: u32, latitude: f64, longitude: f64) -> Self {
        self.waypoints.push(WaypointReport {
            sequence,
            position: Position::new(latitude, longitude),
            eta: None,
        });
        self
    }

    pub fn with_waypoint_eta(
        mut self,
        sequence: u32,
        latitude: f64,
        longitude: f64,
        eta: DateTime<Utc>,
    ) -> Self {
        self.waypoints.push(WaypointReport {
            sequence,
            position: Position::new(latitude, longitude),
            eta: Some(eta),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Stored waypoint of an intended route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteWaypoint {
    pub sequence: u32,
    pub position: Position,
    pub eta: Option<DateTime<Utc>>,
    /// Timestamp of the report that supplied this waypoint
    pub reported_at: DateTime<Utc>,
}

/// Intended route owned by a vessel's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntendedRoute {
    waypoints: BTreeMap<u32, RouteWaypoint>,
}

impl IntendedRoute {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a fragment reported at `reported_at`.
    ///
    /// A waypoint replaces the stored one with the same sequence number
    /// unless the stored one came from a strictly later report. Returns true
    /// if any waypoint was inserted or replaced.
    pub fn merge(&mut self, fragment: &RouteFragment, reported_at: DateTime<Utc>) -> bool {
        let mut changed = false;

        for wp in &fragment.waypoints {
            let incoming = RouteWaypoint {
                sequence: wp.sequence,
                position: wp.position,
                eta: wp.eta,
                reported_at,
            };

            match self.waypoints.get(&wp.sequence) {
                Some(existing) if existing.reported_at > reported_at => {}
                Some(existing) if *existing == incoming => {}
                _ => {
                    self.waypoints.insert(wp.sequence, incoming);
                    changed = true;
                }
            }
        }

        changed
    }

    /// Waypoints in sequence order.
    pub fn waypoints(&self) -> impl Iterator<Item = &RouteWaypoint> {
        self.waypoints.values()
    }

    pub fn get(&self, sequence: u32) -> Option<&RouteWaypoint> {
        self.waypoints.get(&sequence)
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_merge_keeps_tail_received_first() {
        let mut route = IntendedRoute::new();

        let tail = RouteFragment::new()
            .with_waypoint(3, 55.3, 12.3)
            .with_waypoint(4, 55.4, 12.4);
        assert!(route.merge(&tail, ts(10)));

        let head = RouteFragment::new()
            .with_waypoint(0, 55.0, 12.0)
            .with_waypoint(1, 55.1, 12.1)
            .with_waypoint(2, 55.2, 12.2);
        assert!(route.merge(&head, ts(11)));

        let sequences: Vec<u32> = route.waypoints().map(|wp| wp.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_later_timestamp_wins_on_conflict() {
        let mut route = IntendedRoute::new();

        route.merge(&RouteFragment::new().with_waypoint(1, 56.0, 11.0), ts(20));
        let changed = route.merge(&RouteFragment::new().with_waypoint(1, 57.0, 10.0), ts(15));

        assert!(!changed);
        assert_eq!(route.get(1).unwrap().position, Position::new(56.0, 11.0));

        let changed = route.merge(&RouteFragment::new().with_waypoint(1, 58.0, 9.0), ts(25));
        assert!(changed);
        assert_eq!(route.get(1).unwrap().position, Position::new(58.0, 9.0));
    }

    #[test]
    fn test_equal_timestamp_takes_newest_arrival() {
        let mut route = IntendedRoute::new();

        route.merge(&RouteFragment::new().with_waypoint(2, 50.0, 1.0), ts(30));
        route.merge(&RouteFragment::new().with_waypoint(2, 51.0, 2.0), ts(30));

        assert_eq!(route.get(2).unwrap().position, Position::new(51.0, 2.0));
    }

    #[test]
    fn test_identical_waypoint_is_not_a_change() {
        let mut route = IntendedRoute::new();
        let fragment = RouteFragment::new().with_waypoint_eta(0, 54.0, 10.0, ts(3600));

        assert!(route.merge(&fragment, ts(40)));
        assert!(!route.merge(&fragment, ts(40)));
        assert_eq!(route.len(), 1);
        assert_eq!(route.get(0).unwrap().eta, Some(ts(3600)));
    }
}
