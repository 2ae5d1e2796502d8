//! Metrics Collection
//!
//! Collects and exports metrics for the target registry including:
//! - Reports applied, rejected and ignored
//! - Live target count
//! - Event fan-out and listener failures
//! - Redraw requests and coalescing
//! - Prometheus export

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use navtrack_core::config::MetricsConfig;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Registry metrics collector
#[derive(Debug)]
pub struct RegistryMetrics {
    reports_applied: AtomicU64,
    targets_created: AtomicU64,
    targets_updated: AtomicU64,
    targets_removed: AtomicU64,
    reports_ignored: AtomicU64,
    reports_rejected: AtomicU64,
    targets_marked_stale: AtomicU64,
}

impl RegistryMetrics {
    pub fn new() -> Self {
        describe_counter!(
            "registry_reports_applied_total",
            "Total reports accepted into the registry"
        );
        describe_counter!("registry_targets_created_total", "Total targets created");
        describe_counter!("registry_targets_updated_total", "Total target updates");
        describe_counter!(
            "registry_targets_removed_total",
            "Total targets removed, labelled by reason"
        );
        describe_counter!(
            "registry_reports_ignored_total",
            "Total reports older than the stored state"
        );
        describe_counter!(
            "registry_reports_rejected_total",
            "Total malformed reports, labelled by reason"
        );
        describe_counter!(
            "registry_targets_stale_total",
            "Total targets marked stale by the sweep"
        );
        describe_gauge!("registry_targets", "Number of targets currently held");

        Self {
            reports_applied: AtomicU64::new(0),
            targets_created: AtomicU64::new(0),
            targets_updated: AtomicU64::new(0),
            targets_removed: AtomicU64::new(0),
            reports_ignored: AtomicU64::new(0),
            reports_rejected: AtomicU64::new(0),
            targets_marked_stale: AtomicU64::new(0),
        }
    }

    pub fn record_applied(&self) {
        self.reports_applied.fetch_add(1, Ordering::Relaxed);
        counter!("registry_reports_applied_total").increment(1);
    }

    pub fn record_created(&self) {
        self.targets_created.fetch_add(1, Ordering::Relaxed);
        counter!("registry_targets_created_total").increment(1);
    }

    pub fn record_updated(&self) {
        self.targets_updated.fetch_add(1, Ordering::Relaxed);
        counter!("registry_targets_updated_total").increment(1);
    }

    pub fn record_removed(&self, reason: &'static str) {
        self.targets_removed.fetch_add(1, Ordering::Relaxed);
        counter!("registry_targets_removed_total", "reason" => reason).increment(1);
    }

    pub fn record_ignored(&self) {
        self.reports_ignored.fetch_add(1, Ordering::Relaxed);
        counter!("registry_reports_ignored_total").increment(1);
    }

    pub fn record_rejected(&self, reason: &'static str) {
        self.reports_rejected.fetch_add(1, Ordering::Relaxed);
        counter!("registry_reports_rejected_total", "reason" => reason).increment(1);
    }

    pub fn record_marked_stale(&self) {
        self.targets_marked_stale.fetch_add(1, Ordering::Relaxed);
        counter!("registry_targets_stale_total").increment(1);
    }

    pub fn set_target_count(&self, count: usize) {
        gauge!("registry_targets").set(count as f64);
    }

    pub fn get_applied(&self) -> u64 {
        self.reports_applied.load(Ordering::Relaxed)
    }

    pub fn get_created(&self) -> u64 {
        self.targets_created.load(Ordering::Relaxed)
    }

    pub fn get_updated(&self) -> u64 {
        self.targets_updated.load(Ordering::Relaxed)
    }

    pub fn get_removed(&self) -> u64 {
        self.targets_removed.load(Ordering::Relaxed)
    }

    pub fn get_ignored(&self) -> u64 {
        self.reports_ignored.load(Ordering::Relaxed)
    }

    pub fn get_rejected(&self) -> u64 {
        self.reports_rejected.load(Ordering::Relaxed)
    }

    pub fn get_marked_stale(&self) -> u64 {
        self.targets_marked_stale.load(Ordering::Relaxed)
    }
}

impl Default for RegistryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Change notifier metrics collector
#[derive(Debug)]
pub struct NotifierMetrics {
    events_published: AtomicU64,
    events_delivered: AtomicU64,
    listener_failures: AtomicU64,
}

impl NotifierMetrics {
    pub fn new() -> Self {
        describe_counter!(
            "notifier_events_published_total",
            "Total change events published"
        );
        describe_counter!(
            "notifier_events_delivered_total",
            "Total events handled successfully by listeners"
        );
        describe_counter!(
            "notifier_listener_failures_total",
            "Total listener errors and panics"
        );
        describe_gauge!("notifier_subscribers", "Number of active subscriptions");

        Self {
            events_published: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            listener_failures: AtomicU64::new(0),
        }
    }

    pub fn record_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        counter!("notifier_events_published_total").increment(1);
    }

    pub fn record_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
        counter!("notifier_events_delivered_total").increment(1);
    }

    pub fn record_listener_failure(&self) {
        self.listener_failures.fetch_add(1, Ordering::Relaxed);
        counter!("notifier_listener_failures_total").increment(1);
    }

    pub fn set_subscriber_count(&self, count: usize) {
        gauge!("notifier_subscribers").set(count as f64);
    }

    pub fn get_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    pub fn get_delivered(&self) -> u64 {
        self.events_delivered.load(Ordering::Relaxed)
    }

    pub fn get_listener_failures(&self) -> u64 {
        self.listener_failures.load(Ordering::Relaxed)
    }
}

impl Default for NotifierMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Redraw throttle metrics collector
#[derive(Debug)]
pub struct ThrottleMetrics {
    refresh_requests: AtomicU64,
    forced_requests: AtomicU64,
    refreshes_fired: AtomicU64,
    signals_folded: AtomicU64,
}

impl ThrottleMetrics {
    pub fn new() -> Self {
        describe_counter!(
            "throttle_refresh_requests_total",
            "Total redraw requests received"
        );
        describe_counter!(
            "throttle_forced_requests_total",
            "Total redraw requests that bypassed the interval"
        );
        describe_counter!("throttle_refreshes_total", "Total refreshes fired");
        describe_counter!(
            "throttle_signals_folded_total",
            "Total refreshes folded into an undelivered signal"
        );
        describe_histogram!(
            "throttle_coalesced_requests",
            "Number of requests covered by each refresh"
        );

        Self {
            refresh_requests: AtomicU64::new(0),
            forced_requests: AtomicU64::new(0),
            refreshes_fired: AtomicU64::new(0),
            signals_folded: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self, forced: bool) {
        self.refresh_requests.fetch_add(1, Ordering::Relaxed);
        counter!("throttle_refresh_requests_total").increment(1);
        if forced {
            self.forced_requests.fetch_add(1, Ordering::Relaxed);
            counter!("throttle_forced_requests_total").increment(1);
        }
    }

    pub fn record_fired(&self, coalesced_requests: u64) {
        self.refreshes_fired.fetch_add(1, Ordering::Relaxed);
        counter!("throttle_refreshes_total").increment(1);
        histogram!("throttle_coalesced_requests").record(coalesced_requests as f64);
    }

    pub fn record_folded(&self) {
        self.signals_folded.fetch_add(1, Ordering::Relaxed);
        counter!("throttle_signals_folded_total").increment(1);
    }

    pub fn get_requests(&self) -> u64 {
        self.refresh_requests.load(Ordering::Relaxed)
    }

    pub fn get_forced(&self) -> u64 {
        self.forced_requests.load(Ordering::Relaxed)
    }

    pub fn get_fired(&self) -> u64 {
        self.refreshes_fired.load(Ordering::Relaxed)
    }

    pub fn get_folded(&self) -> u64 {
        self.signals_folded.load(Ordering::Relaxed)
    }

    /// Average number of requests covered by one refresh.
    pub fn get_coalescing_ratio(&self) -> f64 {
        let fired = self.get_fired() as f64;
        if fired > 0.0 {
            self.get_requests() as f64 / fired
        } else {
            0.0
        }
    }
}

impl Default for ThrottleMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the Prometheus recorder and its HTTP scrape endpoint.
///
/// Must be called from within a Tokio runtime. Does nothing when metrics
/// export is disabled.
pub fn install_prometheus_exporter(config: &MetricsConfig) -> anyhow::Result<()> {
    if !config.enabled {
        info!("Metrics export disabled");
        return Ok(());
    }

    let addr = config.socket_addr()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("throttle_coalesced_requests".to_string()),
            &[1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0],
        )?
        .install()?;

    info!(bind_address = %addr, "Prometheus metrics exporter started");

    Ok(())
}

/// Metrics of all tracker components, for in-process reporting
pub struct MetricsRegistry {
    registry: Arc<RegistryMetrics>,
    notifier: Arc<NotifierMetrics>,
    throttle: Arc<ThrottleMetrics>,
}

impl MetricsRegistry {
    /// Groups the collectors owned by the running components
    pub fn new(
        registry: Arc<RegistryMetrics>,
        notifier: Arc<NotifierMetrics>,
        throttle: Arc<ThrottleMetrics>,
    ) -> Self {
        Self {
            registry,
            notifier,
            throttle,
        }
    }

    pub fn registry(&self) -> Arc<RegistryMetrics> {
        Arc::clone(&self.registry)
    }

    pub fn notifier(&self) -> Arc<NotifierMetrics> {
        Arc::clone(&self.notifier)
    }

    pub fn throttle(&self) -> Arc<ThrottleMetrics> {
        Arc::clone(&self.throttle)
    }

    /// Get metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reports_applied: self.registry.get_applied(),
            reports_ignored: self.registry.get_ignored(),
            reports_rejected: self.registry.get_rejected(),
            targets_created: self.registry.get_created(),
            targets_removed: self.registry.get_removed(),
            targets_marked_stale: self.registry.get_marked_stale(),
            events_published: self.notifier.get_published(),
            listener_failures: self.notifier.get_listener_failures(),
            refreshes_fired: self.throttle.get_fired(),
            coalescing_ratio: self.throttle.get_coalescing_ratio(),
        }
    }
}

/// Metrics snapshot for reporting
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub reports_applied: u64,
    pub reports_ignored: u64,
    pub reports_rejected: u64,
    pub targets_created: u64,
    pub targets_removed: u64,
    pub targets_marked_stale: u64,
    pub events_published: u64,
    pub listener_failures: u64,
    pub refreshes_fired: u64,
    pub coalescing_ratio: f64,
}
