//! Periodic expiry sweep
//!
//! Runs [`TargetRegistry::sweep`] on a fixed interval so that targets which
//! fall silent are marked stale and eventually removed without any report
//! arriving to trigger it.

use chrono::Utc;
use navtrack_core::config::TrackerConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::TargetRegistry;

/// Sweep scheduler
pub struct SweepScheduler {
    registry: Arc<TargetRegistry>,
    interval: Duration,
    expiry_timeout: Duration,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SweepScheduler {
    pub fn new(registry: Arc<TargetRegistry>, config: &TrackerConfig) -> Self {
        Self {
            registry,
            interval: config.sweep_interval(),
            expiry_timeout: config.expiry_timeout(),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Ties the sweep loop to an application-wide shutdown token.
    pub fn with_shutdown(mut self, shutdown: &CancellationToken) -> Self {
        self.cancel = shutdown.child_token();
        self
    }

    /// Starts the sweep task. The first sweep runs immediately.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let registry = Arc::clone(&self.registry);
        let cancel = self.cancel.clone();
        let interval = self.interval;
        let expiry_timeout = self.expiry_timeout;

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = registry.sweep(Utc::now(), expiry_timeout);
                        if !removed.is_empty() {
                            debug!(removed = removed.len(), "Sweep removed expired targets");
                        }
                    }
                }
            }

            debug!("Sweep task exited");
        }));

        info!(
            interval_secs = interval.as_secs(),
            expiry_timeout_secs = expiry_timeout.as_secs(),
            "Expiry sweep started"
        );
    }

    /// Cancels the sweep task and waits for it to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }

        info!("Expiry sweep stopped");
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|task| !task.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{ChangeNotifier, TargetEvent};
    use navtrack_core::types::RemovalReason;
    use navtrack_core::{TargetIdentity, TargetKind, TargetReport};

    fn test_config() -> TrackerConfig {
        TrackerConfig {
            expiry_timeout_secs: 30,
            stale_after_secs: 20,
            sweep_interval_secs: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sweep_task_expires_silent_target() {
        let notifier = Arc::new(ChangeNotifier::new());
        let (_, rx) = notifier.subscribe_channel();
        let registry = Arc::new(TargetRegistry::new(&test_config(), notifier).unwrap());

        let id = TargetIdentity::new(123_456_789);
        let last_heard = Utc::now() - chrono::Duration::seconds(31);
        registry
            .apply(&TargetReport::new(id, TargetKind::Vessel, last_heard).with_position(55.0, 12.0))
            .unwrap();
        let _ = rx.drain().count();

        let sweeper = SweepScheduler::new(Arc::clone(&registry), &test_config());
        sweeper.start();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv_async())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            TargetEvent::Removed {
                reason: RemovalReason::Expired,
                ..
            }
        ));
        assert!(!registry.contains(id));

        sweeper.stop().await;
        assert!(!sweeper.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_sweep() {
        let registry = Arc::new(
            TargetRegistry::new(&test_config(), Arc::new(ChangeNotifier::new())).unwrap(),
        );
        let shutdown = CancellationToken::new();
        let sweeper = SweepScheduler::new(registry, &test_config()).with_shutdown(&shutdown);

        sweeper.start();
        assert!(sweeper.is_running());

        shutdown.cancel();
        sweeper.stop().await;
        assert!(!sweeper.is_running());
    }
}
