//! Redraw Throttle
//!
//! Turns a stream of refresh requests into a bounded rate of refresh
//! signals. Requests made within one minimum interval collapse into a single
//! signal; forced requests skip the interval and wake the scheduler at once.
//!
//! ```text
//!   request_refresh(false) ──┐
//!   request_refresh(false) ──┼─► pending ──(tick, interval elapsed)──► RefreshSignal
//!   request_refresh(true)  ──┘       └──────(wake, forced)──────────►
//! ```
//!
//! Signals go out on a capacity-1 channel. When the consumer has not yet
//! taken the previous signal, the new one is folded into it, so a slow
//! renderer only ever sees the latest state.

use flume::{Receiver, Sender, TrySendError};
use navtrack_core::config::ThrottleConfig;
use navtrack_core::Result;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::ThrottleMetrics;
use crate::notifier::{TargetEvent, TargetListener};

/// Tells the renderer to redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshSignal {
    /// Increases by one per refresh fired
    pub sequence: u64,
    /// Requests covered by this signal
    pub coalesced_requests: u64,
    /// At least one covered request was forced
    pub forced: bool,
}

impl RefreshSignal {
    fn fold(self, newer: RefreshSignal) -> RefreshSignal {
        RefreshSignal {
            sequence: self.sequence.max(newer.sequence),
            coalesced_requests: self.coalesced_requests + newer.coalesced_requests,
            forced: self.forced || newer.forced,
        }
    }
}

#[derive(Debug, Default)]
struct ThrottleState {
    pending: bool,
    forced: bool,
    /// None until the first refresh fires
    last_refresh: Option<Instant>,
    requests: u64,
    sequence: u64,
    /// Set by `stop`; later requests fire at once
    stopped: bool,
}

/// Redraw Throttle
pub struct RedrawThrottle {
    min_interval: Duration,
    tick_interval: Duration,
    state: Mutex<ThrottleState>,
    wake: Notify,
    signal_tx: Sender<RefreshSignal>,
    signal_rx: Receiver<RefreshSignal>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<ThrottleMetrics>,
}

impl RedrawThrottle {
    /// Creates a stopped throttle.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(config: &ThrottleConfig) -> Result<Self> {
        config.validate()?;

        let (signal_tx, signal_rx) = flume::bounded(1);

        Ok(Self {
            min_interval: config.min_refresh_interval(),
            tick_interval: config.tick_interval(),
            state: Mutex::new(ThrottleState::default()),
            wake: Notify::new(),
            signal_tx,
            signal_rx,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
            metrics: Arc::new(ThrottleMetrics::new()),
        })
    }

    /// Ties the scheduler to an application-wide shutdown token.
    pub fn with_shutdown(mut self, shutdown: &CancellationToken) -> Self {
        self.cancel = shutdown.child_token();
        self
    }

    /// Records that the view needs redrawing.
    ///
    /// A forced request is due immediately; otherwise it is due once the
    /// minimum interval has passed since the last refresh. Once the throttle
    /// is stopped every request is flushed immediately. Safe to call from any
    /// thread.
    pub fn request_refresh(&self, force: bool) {
        let stopped = {
            let mut state = self.state.lock();
            state.pending = true;
            state.requests += 1;
            state.forced |= force;
            state.stopped
        };

        self.metrics.record_request(force);

        if stopped {
            debug!(force, "Refresh requested after stop");
            self.flush();
        } else if force {
            self.wake.notify_one();
        }
    }

    /// Receiver of refresh signals. Clones share one queue.
    pub fn signals(&self) -> Receiver<RefreshSignal> {
        self.signal_rx.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    /// Get throttle metrics
    pub fn metrics(&self) -> Arc<ThrottleMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Starts the scheduler task. Must be called from within a Tokio runtime.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let throttle = Arc::clone(self);
        *task = Some(tokio::spawn(async move { throttle.run().await }));

        info!(
            min_interval_ms = self.min_interval.as_millis() as u64,
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "Redraw throttle started"
        );
    }

    /// Stops the scheduler, flushing a pending refresh first.
    pub async fn stop(&self) {
        self.state.lock().stopped = true;
        self.cancel.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Redraw scheduler task failed");
            }
        }
        self.flush();

        info!("Redraw throttle stopped");
    }

    async fn run(&self) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.flush();
                    break;
                }
                _ = self.wake.notified() => {}
                _ = ticker.tick() => {}
            }

            if let Some(signal) = self.poll_due(Instant::now(), false) {
                self.deliver(signal);
            }
        }

        debug!("Redraw scheduler exited");
    }

    fn flush(&self) {
        if let Some(signal) = self.poll_due(Instant::now(), true) {
            debug!(sequence = signal.sequence, "Flushing pending refresh");
            self.deliver(signal);
        }
    }

    /// Takes the pending refresh if it is due at `now`.
    ///
    /// `flush` ignores the minimum interval.
    fn poll_due(&self, now: Instant, flush: bool) -> Option<RefreshSignal> {
        let mut state = self.state.lock();
        if !state.pending {
            return None;
        }

        let due = flush
            || state.forced
            || state
                .last_refresh
                .map_or(true, |last| now.saturating_duration_since(last) >= self.min_interval);
        if !due {
            return None;
        }

        state.sequence += 1;
        let signal = RefreshSignal {
            sequence: state.sequence,
            coalesced_requests: state.requests,
            forced: state.forced,
        };

        state.pending = false;
        state.forced = false;
        state.requests = 0;
        state.last_refresh = Some(now);

        Some(signal)
    }

    fn deliver(&self, signal: RefreshSignal) {
        self.metrics.record_fired(signal.coalesced_requests);

        match self.signal_tx.try_send(signal) {
            Ok(()) => {
                debug!(
                    sequence = signal.sequence,
                    coalesced = signal.coalesced_requests,
                    forced = signal.forced,
                    "Refresh fired"
                );
            }
            Err(TrySendError::Full(signal)) => {
                // Only this throttle sends, so the slot is free after taking
                // the queued signal.
                let merged = match self.signal_rx.try_recv() {
                    Ok(queued) => queued.fold(signal),
                    Err(_) => signal,
                };
                self.metrics.record_folded();
                if self.signal_tx.try_send(merged).is_err() {
                    warn!(sequence = merged.sequence, "Dropping refresh signal");
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Refresh signal receiver gone");
            }
        }
    }
}

/// Requests a refresh for every change event.
pub struct RefreshListener {
    throttle: Arc<RedrawThrottle>,
}

impl RefreshListener {
    pub fn new(throttle: Arc<RedrawThrottle>) -> Self {
        Self { throttle }
    }
}

impl TargetListener for RefreshListener {
    fn on_event(&self, event: &TargetEvent) -> anyhow::Result<()> {
        self.throttle.request_refresh(event.force_refresh());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navtrack_core::types::RemovalReason;
    use navtrack_core::TargetIdentity;

    fn test_config() -> ThrottleConfig {
        ThrottleConfig {
            min_refresh_interval_ms: 1_000,
            tick_interval_ms: 100,
        }
    }

    fn started() -> Arc<RedrawThrottle> {
        let throttle = Arc::new(RedrawThrottle::new(&test_config()).unwrap());
        throttle.start();
        throttle
    }

    async fn fire_first(throttle: &RedrawThrottle, rx: &Receiver<RefreshSignal>) {
        throttle.request_refresh(false);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(rx.try_recv().unwrap().sequence, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ThrottleConfig {
            min_refresh_interval_ms: 100,
            tick_interval_ms: 0,
        };
        assert!(RedrawThrottle::new(&config).is_err());
    }

    #[test]
    fn test_poll_due_respects_interval() {
        let throttle = RedrawThrottle::new(&test_config()).unwrap();
        let t0 = Instant::now();

        assert!(throttle.poll_due(t0, false).is_none());

        throttle.request_refresh(false);
        let signal = throttle.poll_due(t0, false).unwrap();
        assert_eq!(signal.sequence, 1);
        assert_eq!(signal.coalesced_requests, 1);

        for _ in 0..5 {
            throttle.request_refresh(false);
        }
        assert!(throttle.poll_due(t0 + Duration::from_millis(999), false).is_none());

        let signal = throttle.poll_due(t0 + Duration::from_millis(1_000), false).unwrap();
        assert_eq!(signal.sequence, 2);
        assert_eq!(signal.coalesced_requests, 5);
        assert!(!throttle.is_pending());
    }

    #[test]
    fn test_poll_due_forced_and_flush() {
        let throttle = RedrawThrottle::new(&test_config()).unwrap();
        let t0 = Instant::now();

        throttle.request_refresh(false);
        throttle.poll_due(t0, false).unwrap();

        throttle.request_refresh(true);
        let signal = throttle.poll_due(t0 + Duration::from_millis(1), false).unwrap();
        assert!(signal.forced);

        throttle.request_refresh(false);
        assert!(throttle.poll_due(t0 + Duration::from_millis(2), false).is_none());
        assert!(throttle.poll_due(t0 + Duration::from_millis(2), true).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesced_into_one_refresh() {
        let throttle = started();
        let rx = throttle.signals();
        fire_first(&throttle, &rx).await;

        for _ in 0..10 {
            throttle.request_refresh(false);
        }

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.sequence, 2);
        assert_eq!(signal.coalesced_requests, 10);
        assert!(!signal.forced);

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert!(rx.try_recv().is_err());

        throttle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_refresh_is_immediate() {
        let throttle = started();
        let rx = throttle.signals();
        fire_first(&throttle, &rx).await;

        throttle.request_refresh(true);
        let signal = tokio::time::timeout(Duration::from_millis(10), rx.recv_async())
            .await
            .expect("forced refresh should not wait for a tick")
            .unwrap();

        assert_eq!(signal.sequence, 2);
        assert!(signal.forced);

        throttle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_refresh_flushed_on_stop() {
        let throttle = started();
        let rx = throttle.signals();
        fire_first(&throttle, &rx).await;

        throttle.request_refresh(false);
        throttle.stop().await;

        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.sequence, 2);
        assert_eq!(signal.coalesced_requests, 1);
        assert!(!throttle.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_after_stop_fires_at_once() {
        let throttle = started();
        let rx = throttle.signals();
        fire_first(&throttle, &rx).await;

        throttle.stop().await;
        assert!(rx.try_recv().is_err());

        throttle.request_refresh(false);
        let signal = rx.try_recv().expect("request after stop is flushed");
        assert_eq!(signal.sequence, 2);
        assert_eq!(signal.coalesced_requests, 1);
        assert!(!throttle.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_undelivered_signal_is_folded() {
        let throttle = started();
        let rx = throttle.signals();

        throttle.request_refresh(false);
        tokio::time::sleep(Duration::from_millis(150)).await;
        throttle.request_refresh(true);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.sequence, 2);
        assert_eq!(signal.coalesced_requests, 2);
        assert!(signal.forced);
        assert!(rx.try_recv().is_err());
        assert_eq!(throttle.metrics().get_folded(), 1);

        throttle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_listener_forwards_force_flag() {
        let throttle = started();
        let rx = throttle.signals();
        fire_first(&throttle, &rx).await;

        let listener = RefreshListener::new(Arc::clone(&throttle));
        listener
            .on_event(&TargetEvent::Removed {
                identity: TargetIdentity::new(1),
                reason: RemovalReason::Expired,
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());
        assert!(throttle.is_pending());

        throttle.stop().await;
        assert_eq!(throttle.metrics().get_requests(), 2);
        assert_eq!(throttle.metrics().get_forced(), 0);
    }
}
