//! Change Notifier
//!
//! Fans target change events out to subscribers. Publishing only enqueues:
//! every subscriber owns an unbounded channel, and listener subscriptions
//! drain theirs on a dedicated task. A slow listener therefore stalls neither
//! ingestion nor the other listeners, and a listener that fails or panics is
//! logged and counted without affecting delivery to anyone else.

use flume::{Receiver, Sender};
use navtrack_core::types::{ChangeKind, RemovalReason};
use navtrack_core::{TargetIdentity, TargetState};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics::NotifierMetrics;

/// A change to the set of tracked targets.
#[derive(Debug, Clone)]
pub enum TargetEvent {
    /// A new target entered the registry
    Created { state: Arc<TargetState> },
    /// An existing target changed
    Updated {
        state: Arc<TargetState>,
        /// The change must be drawn without waiting for the refresh interval
        force_refresh: bool,
    },
    /// A target left the registry
    Removed {
        identity: TargetIdentity,
        reason: RemovalReason,
    },
}

impl TargetEvent {
    pub fn identity(&self) -> TargetIdentity {
        match self {
            TargetEvent::Created { state } | TargetEvent::Updated { state, .. } => state.identity,
            TargetEvent::Removed { identity, .. } => *identity,
        }
    }

    pub fn change(&self) -> ChangeKind {
        match self {
            TargetEvent::Created { .. } => ChangeKind::Created,
            TargetEvent::Updated { .. } => ChangeKind::Updated,
            TargetEvent::Removed { .. } => ChangeKind::Removed,
        }
    }

    /// State after the change, absent for removals.
    pub fn state(&self) -> Option<&Arc<TargetState>> {
        match self {
            TargetEvent::Created { state } | TargetEvent::Updated { state, .. } => Some(state),
            TargetEvent::Removed { .. } => None,
        }
    }

    pub fn force_refresh(&self) -> bool {
        matches!(
            self,
            TargetEvent::Updated {
                force_refresh: true,
                ..
            }
        )
    }
}

/// Receives change events on its own task.
///
/// Listeners run off the ingestion path, but a listener that blocks for long
/// delays the events queued behind it. An `Err` is logged and counted; the
/// next event is still delivered.
pub trait TargetListener: Send + Sync + 'static {
    fn on_event(&self, event: &TargetEvent) -> anyhow::Result<()>;
}

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscriber {
    tx: Sender<TargetEvent>,
    /// Listener task, absent for channel subscriptions
    task: Option<JoinHandle<()>>,
}

/// Change Notifier
pub struct ChangeNotifier {
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
    metrics: Arc<NotifierMetrics>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            metrics: Arc::new(NotifierMetrics::new()),
        }
    }

    fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Subscribes a listener.
    ///
    /// Spawns the listener's delivery task, so this must be called from
    /// within a Tokio runtime. Events published before the call are not
    /// replayed.
    pub fn subscribe(&self, listener: Arc<dyn TargetListener>) -> SubscriptionId {
        let id = self.allocate_id();
        let (tx, rx) = flume::unbounded();
        let task = Self::spawn_listener(id, listener, rx, Arc::clone(&self.metrics));

        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.insert(
                id,
                Subscriber {
                    tx,
                    task: Some(task),
                },
            );
            subscribers.len()
        };
        self.metrics.set_subscriber_count(count);

        info!(subscription = %id, "Listener subscribed");
        id
    }

    /// Subscribes a channel instead of a listener.
    ///
    /// The receiver gets every event published from now on. Dropping it ends
    /// the subscription on the next publish.
    pub fn subscribe_channel(&self) -> (SubscriptionId, Receiver<TargetEvent>) {
        let id = self.allocate_id();
        let (tx, rx) = flume::unbounded();

        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.insert(id, Subscriber { tx, task: None });
            subscribers.len()
        };
        self.metrics.set_subscriber_count(count);

        debug!(subscription = %id, "Channel subscribed");
        (id, rx)
    }

    /// Ends a subscription.
    ///
    /// Events already queued for the subscriber are still delivered; nothing
    /// published afterwards is. Returns false for an unknown id.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers.write();
            let removed = subscribers.remove(&id);
            (removed, subscribers.len())
        };

        match removed {
            Some(_) => {
                self.metrics.set_subscriber_count(count);
                info!(subscription = %id, "Unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Enqueues an event for every current subscriber.
    ///
    /// Never blocks and never runs listener code.
    pub fn publish(&self, event: TargetEvent) {
        self.metrics.record_published();

        let mut disconnected = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                if subscriber.tx.send(event.clone()).is_err() {
                    disconnected.push(*id);
                }
            }
        }

        for id in disconnected {
            debug!(subscription = %id, "Subscriber receiver dropped, removing subscription");
            self.unsubscribe(id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Get notifier metrics
    pub fn metrics(&self) -> Arc<NotifierMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Removes every subscription and waits for listener tasks to drain the
    /// events already queued for them.
    pub async fn shutdown(&self) {
        let drained: Vec<(SubscriptionId, Subscriber)> =
            self.subscribers.write().drain().collect();
        self.metrics.set_subscriber_count(0);

        info!(subscribers = drained.len(), "Shutting down change notifier");

        let mut tasks = Vec::new();
        for (_, subscriber) in drained {
            drop(subscriber.tx);
            if let Some(task) = subscriber.task {
                tasks.push(task);
            }
        }

        for task in tasks {
            let _ = task.await;
        }

        info!("Change notifier stopped");
    }

    fn spawn_listener(
        id: SubscriptionId,
        listener: Arc<dyn TargetListener>,
        rx: Receiver<TargetEvent>,
        metrics: Arc<NotifierMetrics>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!(subscription = %id, "Listener task started");

            while let Ok(event) = rx.recv_async().await {
                match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))) {
                    Ok(Ok(())) => metrics.record_delivered(),
                    Ok(Err(e)) => {
                        metrics.record_listener_failure();
                        warn!(
                            subscription = %id,
                            identity = %event.identity(),
                            change = %event.change(),
                            error = %e,
                            "Listener failed to handle event"
                        );
                    }
                    Err(payload) => {
                        metrics.record_listener_failure();
                        warn!(
                            subscription = %id,
                            identity = %event.identity(),
                            change = %event.change(),
                            panic = %panic_message(payload.as_ref()),
                            "Listener panicked while handling event"
                        );
                    }
                }
            }

            debug!(subscription = %id, "Listener task stopped");
        })
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
