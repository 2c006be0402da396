// ── Notification router ──
//
// Process-wide fan-out for inbound push payloads. The ingress publishes
// once; every subscribed reconciler receives every payload and filters by
// its own bound host. Subscriptions are explicit handles, removed
// deterministically on teardown.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use tailwind_api::NotificationPayload;

/// Number of payloads kept for diagnostics.
pub const NOTIFICATION_LOG_CAPACITY: usize = 10;

/// Per-subscriber queue depth. A full queue drops the payload for that
/// subscriber only.
const SUBSCRIBER_BUFFER: usize = 64;

/// Identifies a router subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A push as delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundNotification {
    pub payload: NotificationPayload,
    /// `host` query parameter from the callback URL, when present.
    pub source_host: Option<String>,
}

/// One entry of the diagnostic log.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationLogEntry {
    pub payload: NotificationPayload,
    pub timestamp: DateTime<Utc>,
}

/// Receiving half of a subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<Arc<InboundNotification>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next payload, or `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<Arc<InboundNotification>> {
        self.rx.recv().await
    }
}

#[derive(Debug)]
pub struct NotificationRouter {
    subscribers: DashMap<SubscriptionId, mpsc::Sender<Arc<InboundNotification>>>,
    next_id: AtomicU64,
    log: Mutex<VecDeque<NotificationLogEntry>>,
}

impl Default for NotificationRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            log: Mutex::new(VecDeque::with_capacity(NOTIFICATION_LOG_CAPACITY)),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.insert(id, tx);
        debug!(subscription = id.0, "router subscription added");
        Subscription { id, rx }
    }

    /// Remove a subscription. Its receiver yields `None` afterwards.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            debug!(subscription = id.0, "router subscription removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Record `payload` in the log, then deliver it to every subscriber.
    pub fn publish(&self, payload: NotificationPayload, source_host: Option<String>) {
        self.record(&payload);

        let notification = Arc::new(InboundNotification {
            payload,
            source_host,
        });

        let mut closed = Vec::new();
        for entry in &self.subscribers {
            match entry.value().try_send(Arc::clone(&notification)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscription = entry.key().0, "subscriber lagging, push dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        for id in closed {
            trace!(subscription = id.0, "pruning closed subscription");
            self.subscribers.remove(&id);
        }
    }

    /// Most recent payloads, oldest first.
    pub fn notification_log(&self) -> Vec<NotificationLogEntry> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn record(&self, payload: &NotificationPayload) {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        if log.len() == NOTIFICATION_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(NotificationLogEntry {
            payload: payload.clone(),
            timestamp: Utc::now(),
        });
    }
}
