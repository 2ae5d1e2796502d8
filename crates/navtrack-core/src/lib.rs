//! # NavTrack Core
//!
//! Core types, lifecycle rules, error handling, and configuration for the
//! NavTrack maritime target registry.
//!
//! This crate provides the foundational building blocks for the NavTrack system:
//!
//! - **Types**: `TargetIdentity`, `TargetKind`, `Position` and the decoded
//!   `TargetReport` handed over by the sensor/decoder collaborator.
//! - **State**: `TargetState`, the cumulative per-target record, with its
//!   lifecycle phase and kind-specific extension data.
//! - **Route**: the intended route of a vessel, merged by waypoint sequence
//!   number from route fragment reports.
//! - **Validation**: range checks that decide whether a report is malformed.
//! - **Errors**: `thiserror` based error types for reports and configuration.
//! - **Configuration**: YAML files, environment variable overrides, and
//!   validation that fails fast at startup.
//!
//! ## Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use navtrack_core::state::TargetState;
//! use navtrack_core::types::{TargetIdentity, TargetKind, TargetPhase, TargetReport};
//!
//! let report = TargetReport::new(
//!     TargetIdentity::new(219_000_001),
//!     TargetKind::Vessel,
//!     Utc.timestamp_opt(100, 0).unwrap(),
//! )
//! .with_position(55.0, 12.0)
//! .with_name("NORDIC STAR");
//!
//! let state = TargetState::from_report(&report);
//! assert_eq!(state.phase, TargetPhase::Active);
//! assert_eq!(state.static_data.name.as_deref(), Some("NORDIC STAR"));
//! ```

pub mod config;
pub mod error;
pub mod route;
pub mod state;
pub mod types;
pub mod validate;

// Re-export commonly used types for convenience
pub use config::AppConfig;
pub use error::{NavTrackError, ReportError, Result};
pub use state::{KindData, TargetState};
pub use types::{
    ChangeKind, Position, TargetIdentity, TargetKind, TargetPhase, TargetReport,
};
