//! Error types for the NavTrack target registry.
//!
//! Nothing in the registry is fatal to the process: malformed reports are
//! rejected with a [`ReportError`] and ingestion continues. The only errors
//! that propagate to startup are configuration errors, which fail fast.
//! All errors implement `std::error::Error` and are serializable for logging.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Result type alias using NavTrackError as the error type.
pub type Result<T> = std::result::Result<T, NavTrackError>;

/// Top-level error type for all NavTrack operations.
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum NavTrackError {
    /// Malformed report rejected by validation
    #[error("Report rejected: {0}")]
    Report(#[from] ReportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// Reasons a decoded report is rejected as malformed.
///
/// A rejected report never touches registry state; it is counted and dropped.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ReportError {
    /// Identity is zero or outside the nine-digit range
    #[error("Invalid identity: {0}")]
    InvalidIdentity(u32),

    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    #[error("Invalid course over ground: {0} (must be in [0, 360))")]
    InvalidCourse(f64),

    #[error("Invalid speed over ground: {0} (must be between 0 and 102.2 knots)")]
    InvalidSpeed(f64),

    #[error("Invalid true heading: {0} (must be in [0, 360))")]
    InvalidHeading(f64),

    #[error("Invalid dimension: {field} = {value} (must be non-negative)")]
    InvalidDimension { field: String, value: f64 },

    /// A route fragment waypoint failed validation
    #[error("Invalid waypoint {sequence}: {reason}")]
    InvalidWaypoint { sequence: u32, reason: String },
}

impl ReportError {
    /// Short machine-friendly label, used as a metric dimension.
    pub fn label(&self) -> &'static str {
        match self {
            ReportError::InvalidIdentity(_) => "identity",
            ReportError::InvalidLatitude(_) => "latitude",
            ReportError::InvalidLongitude(_) => "longitude",
            ReportError::InvalidCourse(_) => "course",
            ReportError::InvalidSpeed(_) => "speed",
            ReportError::InvalidHeading(_) => "heading",
            ReportError::InvalidDimension { .. } => "dimension",
            ReportError::InvalidWaypoint { .. } => "waypoint",
        }
    }
}

/// Errors related to configuration.
///
/// These errors occur when loading, parsing, or validating configuration files.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },
}

impl ConfigError {
    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a validation failed error.
    pub fn validation_failed(reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            reason: reason.into(),
        }
    }
}

/// Wrapper for I/O errors to make them serializable.
#[derive(Debug, Error, Serialize, Deserialize)]
#[error("I/O error: {kind}: {message}")]
pub struct IoError {
    pub kind: String,
    pub message: String,
}

impl From<io::Error> for IoError {
    fn from(err: io::Error) -> Self {
        Self {
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }
}

impl From<io::Error> for NavTrackError {
    fn from(err: io::Error) -> Self {
        NavTrackError::Io(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = NavTrackError::Report(ReportError::InvalidLatitude(91.5));
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("Report"));
        assert!(json.contains("91.5"));
    }

    #[test]
    fn test_config_error_helpers() {
        let err = ConfigError::invalid_value("tracker.stale_after_secs", "must be positive");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(err.to_string().contains("tracker.stale_after_secs"));

        let err = ConfigError::validation_failed("stale_after must be shorter than expiry");
        assert!(matches!(err, ConfigError::ValidationFailed { .. }));
    }

    #[test]
    fn test_report_error_labels() {
        assert_eq!(ReportError::InvalidIdentity(0).label(), "identity");
        assert_eq!(
            ReportError::InvalidWaypoint {
                sequence: 3,
                reason: "latitude out of range".to_string()
            }
            .label(),
            "waypoint"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: NavTrackError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, NavTrackError::Io(_)));
        assert!(err.to_string().contains("NotFound"));
    }
}
