//! NavTrack Tracker
//!
//! Live target registry for decoded maritime identification reports, with
//! change fan-out, periodic expiry and a redraw throttle for the display.
//!
//! # Architecture
//!
//! ```text
//!   decoded reports
//!         │
//!  ┌──────▼─────────────────┐        ┌──────────────────────┐
//!  │   Target Registry      │◄───────┤   Sweep Scheduler    │
//!  │  (registry.rs)         │ sweep  │  (sweeper.rs)        │
//!  │  - Validate            │        │  - Mark stale        │
//!  │  - Order by timestamp  │        │  - Expire silent     │
//!  │  - Field-wise merge    │        └──────────────────────┘
//!  │  - Name cache          │
//!  └──────┬─────────────────┘
//!         │ TargetEvent (enqueue only)
//!  ┌──────▼─────────────────┐
//!  │   Change Notifier      │
//!  │  (notifier.rs)         │
//!  │  - Task per listener   │
//!  │  - Failure isolation   │
//!  └──────┬──────────┬──────┘
//!         │          │
//!  ┌──────▼──────┐  ┌▼───────────────────────┐
//!  │  Listeners  │  │   Redraw Throttle      │
//!  │             │  │  (throttle.rs)         │
//!  └─────────────┘  │  - Coalesce requests   │
//!                   │  - Forced refresh      │──► RefreshSignal
//!                   │  - Final flush         │
//!                   └────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use navtrack_core::config::AppConfig;
//! use navtrack_core::{TargetIdentity, TargetKind, TargetReport};
//! use navtrack_tracker::{
//!     ChangeNotifier, RedrawThrottle, RefreshListener, SweepScheduler, TargetRegistry,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::default();
//!
//!     let notifier = Arc::new(ChangeNotifier::new());
//!     let registry = Arc::new(TargetRegistry::new(&config.tracker, Arc::clone(&notifier))?);
//!
//!     let throttle = Arc::new(RedrawThrottle::new(&config.throttle)?);
//!     throttle.start();
//!     notifier.subscribe(Arc::new(RefreshListener::new(Arc::clone(&throttle))));
//!
//!     let sweeper = SweepScheduler::new(Arc::clone(&registry), &config.tracker);
//!     sweeper.start();
//!
//!     let report = TargetReport::new(TargetIdentity::new(219_000_001), TargetKind::Vessel, Utc::now())
//!         .with_position(55.68, 12.57);
//!     registry.apply(&report)?;
//!
//!     let signal = throttle.signals().recv_async().await?;
//!     println!("redraw #{}: {} targets", signal.sequence, registry.snapshot().len());
//!
//!     sweeper.stop().await;
//!     throttle.stop().await;
//!     notifier.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod metrics;
pub mod names;
pub mod notifier;
pub mod registry;
pub mod sweeper;
pub mod throttle;

pub use metrics::{
    install_prometheus_exporter, MetricsRegistry, MetricsSnapshot, NotifierMetrics,
    RegistryMetrics, ThrottleMetrics,
};
pub use names::NameCache;
pub use notifier::{ChangeNotifier, SubscriptionId, TargetEvent, TargetListener};
pub use registry::{RegistryStats, TargetRegistry};
pub use sweeper::SweepScheduler;
pub use throttle::{RedrawThrottle, RefreshListener, RefreshSignal};
