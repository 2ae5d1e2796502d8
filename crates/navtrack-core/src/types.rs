//! Core types for the NavTrack target registry.
//!
//! This module defines the decoded report handed over by the sensor/decoder
//! collaborator and the small value types shared by the registry, the
//! lifecycle rules and the change feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::route::RouteFragment;

/// Identity number of a tracked target (vessel or station identity).
///
/// Immutable and unique per target; used as the registry key. Valid
/// identities are non-zero and at most nine decimal digits.
///
/// # Examples
///
/// ```
/// use navtrack_core::types::TargetIdentity;
///
/// let id = TargetIdentity::new(123_456_789);
/// assert!(id.is_valid());
/// assert_eq!(id.to_string(), "123456789");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetIdentity(u32);

impl TargetIdentity {
    /// Largest identity a nine-digit identity number can carry.
    pub const MAX: u32 = 999_999_999;

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Returns true if the identity is non-zero and within nine digits.
    pub fn is_valid(&self) -> bool {
        self.0 != 0 && self.0 <= Self::MAX
    }
}

impl fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of physical object behind a target.
///
/// Fixed once a target is first observed. Adding a kind is an exhaustiveness
/// change for every `match` over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Ship carrying a transponder
    Vessel,
    /// Fixed or floating aid-to-navigation (buoy, light, virtual mark)
    AidToNavigation,
    /// Search-and-rescue transmitter
    SearchAndRescue,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Vessel => write!(f, "vessel"),
            TargetKind::AidToNavigation => write!(f, "aton"),
            TargetKind::SearchAndRescue => write!(f, "sart"),
        }
    }
}

/// Lifecycle phase of a target.
///
/// `Provisional` → `Active` → `Stale` → `Gone`. Transitions are driven by the
/// registry only; `Gone` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPhase {
    /// First report received, no position yet
    Provisional,
    /// Has at least a position
    Active,
    /// Silent for longer than the stale interval
    Stale,
    /// Removed from the registry
    Gone,
}

impl TargetPhase {
    /// Returns true if the target has enough data to be drawn.
    pub fn is_renderable(&self) -> bool {
        matches!(self, TargetPhase::Active | TargetPhase::Stale)
    }
}

impl fmt::Display for TargetPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetPhase::Provisional => write!(f, "provisional"),
            TargetPhase::Active => write!(f, "active"),
            TargetPhase::Stale => write!(f, "stale"),
            TargetPhase::Gone => write!(f, "gone"),
        }
    }
}

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude (-90 to 90)
    pub latitude: f64,
    /// Longitude (-180 to 180)
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

/// Hull dimensions relative to the position reference point, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub to_bow: f64,
    pub to_stern: f64,
    pub to_port: f64,
    pub to_starboard: f64,
}

/// Static and voyage data carried by a report.
///
/// Every field is independently optional: a static-data report that only
/// carries a name leaves the stored callsign and dimensions untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ship_type: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl StaticData {
    /// Overwrites every field that is present in `update`.
    pub fn merge(&mut self, update: &StaticData) {
        if let Some(name) = &update.name {
            self.name = Some(name.clone());
        }
        if let Some(callsign) = &update.callsign {
            self.callsign = Some(callsign.clone());
        }
        if let Some(destination) = &update.destination {
            self.destination = Some(destination.clone());
        }
        if let Some(ship_type) = update.ship_type {
            self.ship_type = Some(ship_type);
        }
        if let Some(dimensions) = update.dimensions {
            self.dimensions = Some(dimensions);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.callsign.is_none()
            && self.destination.is_none()
            && self.ship_type.is_none()
            && self.dimensions.is_none()
    }
}

/// Activation status of a search-and-rescue transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SartStatus {
    /// Transmitting in earnest
    Active,
    /// Transmitting in test mode
    Test,
}

/// Aid-to-navigation attributes carried by a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtonData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aton_type: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_aton: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_position: Option<bool>,
}

impl AtonData {
    /// Overwrites every field that is present in `update`.
    pub fn merge(&mut self, update: &AtonData) {
        if update.aton_type.is_some() {
            self.aton_type = update.aton_type;
        }
        if update.virtual_aton.is_some() {
            self.virtual_aton = update.virtual_aton;
        }
        if update.off_position.is_some() {
            self.off_position = update.off_position;
        }
    }
}

/// One decoded observation of a target.
///
/// Produced by the decoder collaborator, which guarantees an identity and a
/// timestamp; everything else is optional and only overwrites what it
/// carries when merged into a [`TargetState`](crate::state::TargetState).
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use navtrack_core::types::{TargetIdentity, TargetKind, TargetReport};
///
/// let report = TargetReport::new(TargetIdentity::new(211_000_002), TargetKind::Vessel, Utc::now())
///     .with_position(54.3, 10.1)
///     .with_course(92.5)
///     .with_speed(11.2);
/// assert!(report.position.is_some());
/// assert!(report.heading.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
    pub identity: TargetIdentity,
    pub kind: TargetKind,
    /// Source timestamp of the observation
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Course over ground in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    /// Speed over ground in knots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// True heading in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_data: Option<StaticData>,
    /// Intended route fragment (vessels only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteFragment>,
    /// Aid-to-navigation attributes (AtoN only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aton: Option<AtonData>,
    /// Activation status (search-and-rescue only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sart_status: Option<SartStatus>,
    /// The target is explicitly gone (lost or cancelled beacon)
    #[serde(default)]
    pub withdrawn: bool,
}

impl TargetReport {
    /// Creates a report that carries nothing but identity, kind and time.
    pub fn new(identity: TargetIdentity, kind: TargetKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            identity,
            kind,
            timestamp,
            position: None,
            course: None,
            speed: None,
            heading: None,
            static_data: None,
            route: None,
            aton: None,
            sart_status: None,
            withdrawn: false,
        }
    }

    /// Creates a withdrawal report for a target.
    pub fn withdrawal(identity: TargetIdentity, kind: TargetKind, timestamp: DateTime<Utc>) -> Self {
        let mut report = Self::new(identity, kind, timestamp);
        report.withdrawn = true;
        report
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.position = Some(Position::new(latitude, longitude));
        self
    }

    pub fn with_course(mut self, course: f64) -> Self {
        self.course = Some(course);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    pub fn with_static_data(mut self, static_data: StaticData) -> Self {
        self.static_data = Some(static_data);
        self
    }

    /// Sets only the name of the static data, keeping other static fields.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.static_data.get_or_insert_with(StaticData::default).name = Some(name.into());
        self
    }

    pub fn with_route(mut self, route: RouteFragment) -> Self {
        self.route = Some(route);
        self
    }

    pub fn with_aton(mut self, aton: AtonData) -> Self {
        self.aton = Some(aton);
        self
    }

    pub fn with_sart_status(mut self, status: SartStatus) -> Self {
        self.sart_status = Some(status);
        self
    }
}

/// Outcome of applying a report to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Removed,
    /// Older than the stored state, or a withdrawal for an unknown target
    Ignored,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Updated => write!(f, "updated"),
            ChangeKind::Removed => write!(f, "removed"),
            ChangeKind::Ignored => write!(f, "ignored"),
        }
    }
}

/// Why a target left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Explicit withdrawal report
    Withdrawn,
    /// Silent for longer than the expiry timeout
    Expired,
    /// Same identity reported with a different kind
    KindChanged,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalReason::Withdrawn => write!(f, "withdrawn"),
            RemovalReason::Expired => write!(f, "expired"),
            RemovalReason::KindChanged => write!(f, "kind_changed"),
        }
    }
}
