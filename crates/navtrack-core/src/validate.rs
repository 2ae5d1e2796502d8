//! Validation for decoded target reports

use crate::error::ReportError;
use crate::route::RouteFragment;
use crate::types::{Position, StaticData, TargetReport};

/// Highest speed over ground a report can carry, in knots.
pub const MAX_SPEED_KNOTS: f64 = 102.2;

/// Validates a decoded report before it is applied.
///
/// Only the fields a report carries are checked; absent fields are fine.
pub fn validate_report(report: &TargetReport) -> Result<(), ReportError> {
    if !report.identity.is_valid() {
        return Err(ReportError::InvalidIdentity(report.identity.value()));
    }

    if let Some(position) = &report.position {
        validate_position(position)?;
    }

    if let Some(course) = report.course {
        if !(0.0..360.0).contains(&course) {
            return Err(ReportError::InvalidCourse(course));
        }
    }

    if let Some(speed) = report.speed {
        if !(0.0..=MAX_SPEED_KNOTS).contains(&speed) {
            return Err(ReportError::InvalidSpeed(speed));
        }
    }

    if let Some(heading) = report.heading {
        if !(0.0..360.0).contains(&heading) {
            return Err(ReportError::InvalidHeading(heading));
        }
    }

    if let Some(static_data) = &report.static_data {
        validate_static_data(static_data)?;
    }

    if let Some(route) = &report.route {
        validate_route(route)?;
    }

    Ok(())
}

/// Validates a Position
pub fn validate_position(position: &Position) -> Result<(), ReportError> {
    // NaN fails both range checks
    if !(-90.0..=90.0).contains(&position.latitude) {
        return Err(ReportError::InvalidLatitude(position.latitude));
    }

    if !(-180.0..=180.0).contains(&position.longitude) {
        return Err(ReportError::InvalidLongitude(position.longitude));
    }

    Ok(())
}

fn validate_static_data(static_data: &StaticData) -> Result<(), ReportError> {
    if let Some(dims) = &static_data.dimensions {
        for (field, value) in [
            ("to_bow", dims.to_bow),
            ("to_stern", dims.to_stern),
            ("to_port", dims.to_port),
            ("to_starboard", dims.to_starboard),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ReportError::InvalidDimension {
                    field: field.to_string(),
                    value,
                });
            }
        }
    }
    Ok(())
}

fn validate_route(route: &RouteFragment) -> Result<(), ReportError> {
    for wp in &route.waypoints {
        validate_position(&wp.position).map_err(|e| ReportError::InvalidWaypoint {
            sequence: wp.sequence,
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
