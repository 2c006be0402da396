// ── State reconciler ──
//
// One reconciler per paired door. It owns the door's last known position,
// polls the controller on a fixed interval, listens on the notification
// router, and fires edge triggers when either channel reports a change.
// Poll results and pushes share one reconciliation path, so whichever
// arrives first sets the new baseline and the other is a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use tailwind_api::{
    CommandClient, CommandResponse, DoorAction, NotificationPayload, NotifyEvent, StatusResponse,
};

use crate::config::ReconcilerConfig;
use crate::door::{Availability, DoorObservation, DoorSnapshot, DoorState, DoorTrigger};
use crate::error::CoreError;
use crate::identity::{ControllerIdentity, IdentityStore};
use crate::router::{InboundNotification, NotificationRouter, Subscription, SubscriptionId};

const TRIGGER_CHANNEL_SIZE: usize = 64;

/// Shared collaborators handed to every reconciler.
#[derive(Clone)]
pub struct ReconcilerContext {
    pub router: Arc<NotificationRouter>,
    pub store: Arc<dyn IdentityStore>,
    pub config: ReconcilerConfig,
}

/// Tracks one door on one controller.
///
/// Cheaply cloneable via `Arc<ReconcilerInner>`. Created with
/// [`start`](Self::start), which guarantees one poll timer and one router
/// subscription per instance; [`stop`](Self::stop) removes both.
#[derive(Clone)]
pub struct StateReconciler {
    pub(crate) inner: Arc<ReconcilerInner>,
}

pub(crate) struct ReconcilerInner {
    pub(crate) device_id: String,
    pub(crate) door_index: u8,
    pub(crate) context: ReconcilerContext,
    pub(crate) client: ArcSwapOption<CommandClient>,
    pub(crate) state: Mutex<ReconcilerState>,
    pub(crate) settings_lock: Mutex<()>,
    /// Bumped by `stop()`. Work tagged with an older value is discarded.
    pub(crate) generation: AtomicU64,
    snapshot: watch::Sender<DoorSnapshot>,
    trigger_tx: broadcast::Sender<DoorTrigger>,
    cancel: CancellationToken,
    subscription: std::sync::Mutex<Option<SubscriptionId>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

pub(crate) struct ReconcilerState {
    pub(crate) identity: ControllerIdentity,
    last_known: DoorState,
}

impl StateReconciler {
    // ── Lifecycle ────────────────────────────────────────────────────

    /// Bind `identity`, fetch status once, then poll and listen for pushes
    /// until [`stop`](Self::stop).
    ///
    /// The initial fetch never fails the call; an unreachable controller
    /// only marks the door unavailable.
    pub async fn start(
        device_id: impl Into<String>,
        identity: ControllerIdentity,
        door_index: u8,
        context: ReconcilerContext,
    ) -> Result<Self, CoreError> {
        let client = context.config.build_client(identity.secret.clone())?;
        let (snapshot, _) = watch::channel(DoorSnapshot::default());
        let (trigger_tx, _) = broadcast::channel(TRIGGER_CHANNEL_SIZE);

        let reconciler = Self {
            inner: Arc::new(ReconcilerInner {
                device_id: device_id.into(),
                door_index,
                context,
                client: ArcSwapOption::from_pointee(client),
                state: Mutex::new(ReconcilerState {
                    identity,
                    last_known: DoorState::Unknown,
                }),
                settings_lock: Mutex::new(()),
                generation: AtomicU64::new(0),
                snapshot,
                trigger_tx,
                cancel: CancellationToken::new(),
                subscription: std::sync::Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        };

        // Subscribe before the first fetch so pushes sent meanwhile queue up.
        let subscription = reconciler.inner.context.router.subscribe();
        *reconciler
            .inner
            .subscription
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(subscription.id());

        let generation = reconciler.generation();
        reconciler.poll_once(generation).await;

        let mut handles = reconciler.inner.task_handles.lock().await;
        handles.push(tokio::spawn(poll_task(reconciler.clone(), generation)));
        handles.push(tokio::spawn(notification_task(
            reconciler.clone(),
            subscription,
            generation,
        )));
        drop(handles);

        info!(
            device = %reconciler.inner.device_id,
            door_index,
            "door reconciler started"
        );
        Ok(reconciler)
    }

    /// Stop polling and leave the router.
    ///
    /// New polls and pushes are cut off before this returns. A timer poll
    /// still waiting on the controller is abandoned; a `refresh()` already
    /// in flight may complete, but its result is discarded.
    pub async fn stop(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.cancel.cancel();
        let subscription = self
            .inner
            .subscription
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(id) = subscription {
            self.inner.context.router.unsubscribe(id);
        }
        self.inner.client.store(None);

        // Wait out any critical section that began before the bump.
        drop(self.inner.state.lock().await);

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        info!(device = %self.inner.device_id, "door reconciler stopped");
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    pub fn door_index(&self) -> u8 {
        self.inner.door_index
    }

    /// The committed identity.
    pub async fn identity(&self) -> ControllerIdentity {
        self.inner.state.lock().await.identity.clone()
    }

    pub fn snapshot(&self) -> DoorSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<DoorSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn triggers(&self) -> broadcast::Receiver<DoorTrigger> {
        self.inner.trigger_tx.subscribe()
    }

    /// True only when the last observation reported the door open.
    pub fn is_open(&self) -> bool {
        self.snapshot().is_open()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send `close` when `close_requested`, else `open`.
    pub async fn issue_command(&self, close_requested: bool) -> Result<CommandResponse, CoreError> {
        let client = self.inner.client.load_full().ok_or(CoreError::Uninitialized)?;
        let host = self.inner.state.lock().await.identity.host.clone();
        let action = if close_requested {
            DoorAction::Close
        } else {
            DoorAction::Open
        };

        info!(host, door_index = self.inner.door_index, action = action.as_str(), "door command");
        Ok(client
            .control_door(&host, self.inner.door_index, action)
            .await?)
    }

    pub async fn open(&self) -> Result<CommandResponse, CoreError> {
        self.issue_command(false).await
    }

    pub async fn close(&self) -> Result<CommandResponse, CoreError> {
        self.issue_command(true).await
    }

    /// Register the callback URL now and report the outcome.
    pub async fn register_callback(&self) -> Result<CommandResponse, CoreError> {
        let client = self.inner.client.load_full().ok_or(CoreError::Uninitialized)?;
        let host = self.inner.state.lock().await.identity.host.clone();
        let url = self.inner.context.config.callback_url(&host)?;
        Ok(client.register_callback(&host, url.as_str()).await?)
    }

    // ── Inbound observations ─────────────────────────────────────────

    /// Reconcile a push delivered outside the router.
    pub async fn handle_notification(
        &self,
        payload: &NotificationPayload,
        source_host: Option<&str>,
    ) {
        self.apply_notification(payload, source_host, self.generation())
            .await;
    }

    /// Fetch status once and reconcile it.
    pub async fn refresh(&self) {
        self.poll_once(self.generation()).await;
    }

    pub(crate) fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        !self.inner.cancel.is_cancelled() && self.generation() == generation
    }

    async fn poll_once(&self, generation: u64) {
        let Some(client) = self.inner.client.load_full() else {
            return;
        };
        let host = self.inner.state.lock().await.identity.host.clone();

        match client.get_status(&host).await {
            Ok(status) => {
                let mut state = self.inner.state.lock().await;
                if !self.is_current(generation) {
                    debug!(host, "discarding poll result after teardown");
                    return;
                }
                self.reconcile(&mut state, &status);
                self.set_availability(Availability::Available);
                let host = state.identity.host.clone();
                drop(state);
                self.spawn_registration(host, "poll");
            }
            Err(e) => {
                warn!(host, error = %e, "status poll failed");
                let _state = self.inner.state.lock().await;
                if !self.is_current(generation) {
                    debug!(host, "discarding poll failure after teardown");
                    return;
                }
                self.set_availability(Availability::unreachable());
            }
        }
    }

    async fn apply_notification(
        &self,
        payload: &NotificationPayload,
        source_host: Option<&str>,
        generation: u64,
    ) {
        let mut state = self.inner.state.lock().await;
        if !self.is_current(generation) {
            debug!("discarding push after teardown");
            return;
        }
        if let Some(source) = source_host {
            if source != state.identity.host {
                trace!(source, bound = %state.identity.host, "push for another controller");
                return;
            }
        }

        debug!(device = %self.inner.device_id, "handling push");
        self.reconcile(&mut state, &payload.status);

        let mut rebooted = false;
        if let Some(notify) = payload.notify {
            match notify.event {
                NotifyEvent::Lock if notify.door_idx == self.inner.door_index => {
                    self.fire(DoorTrigger::DoorLocked);
                }
                NotifyEvent::Reboot => {
                    self.fire(DoorTrigger::ControllerRebooted);
                    rebooted = true;
                }
                _ => {}
            }
        }

        let host = state.identity.host.clone();
        drop(state);
        if rebooted {
            self.spawn_registration(host, "reboot");
        }
    }

    /// Compare one observation against the last known position.
    fn reconcile(&self, state: &mut ReconcilerState, status: &StatusResponse) {
        let Some(observation) = DoorObservation::extract(status, self.inner.door_index) else {
            trace!(door_index = self.inner.door_index, "no entry for tracked door");
            return;
        };

        let trigger = state.last_known.observe(observation.closed);
        let position = state.last_known;
        self.inner.snapshot.send_modify(|snapshot| {
            snapshot.state = position;
            snapshot.locked = observation.locked;
            snapshot.disabled = observation.disabled;
        });

        if let Some(trigger) = trigger {
            self.fire(trigger);
        }
    }

    fn set_availability(&self, availability: Availability) {
        self.inner.snapshot.send_if_modified(|snapshot| {
            if snapshot.availability == availability {
                return false;
            }
            snapshot.availability = availability;
            true
        });
    }

    fn fire(&self, trigger: DoorTrigger) {
        info!(device = %self.inner.device_id, %trigger, "trigger");
        if self.inner.trigger_tx.send(trigger).is_err() {
            trace!(%trigger, "no trigger subscribers");
        }
    }

    /// Re-register the callback URL in the background. Failures are logged.
    pub(crate) fn spawn_registration(&self, host: String, reason: &'static str) {
        let Some(client) = self.inner.client.load_full() else {
            return;
        };
        let url = match self.inner.context.config.callback_url(&host) {
            Ok(url) => url,
            Err(e) => {
                warn!(host, error = %e, "cannot build callback url");
                return;
            }
        };

        tokio::spawn(async move {
            match client.register_callback(&host, url.as_str()).await {
                Ok(_) => debug!(host, reason, "callback registered"),
                Err(e) => warn!(host, reason, error = %e, "callback registration failed"),
            }
        });
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn poll_task(reconciler: StateReconciler, generation: u64) {
    let cancel = reconciler.inner.cancel.clone();
    let mut interval = tokio::time::interval(reconciler.inner.context.config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // the initial fetch already ran

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                // A slow poll must not hold up `stop()`.
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = reconciler.poll_once(generation) => {}
                }
            }
        }
    }
}

async fn notification_task(
    reconciler: StateReconciler,
    mut subscription: Subscription,
    generation: u64,
) {
    let cancel = reconciler.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            notification = subscription.recv() => {
                let Some(notification) = notification else { break };
                let InboundNotification { payload, source_host } = notification.as_ref();
                reconciler
                    .apply_notification(payload, source_host.as_deref(), generation)
                    .await;
            }
        }
    }
}
