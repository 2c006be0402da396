#![allow(clippy::unwrap_used)]
// Reconciler scenarios against a wiremock controller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tailwind_core::settings::{INVALID_HOST, INVALID_SECRET, SETTINGS_SAVED, TRIAL_FAILED};
use tailwind_core::{
    Availability, ControllerIdentity, CoreError, DoorState, DoorTrigger, IdentityStore,
    MemoryStore, NotificationPayload, NotificationRouter, ReconcilerConfig, ReconcilerContext,
    RetryPolicy, SettingsChange, StateReconciler,
};

// ── Helpers ─────────────────────────────────────────────────────────

const KEY: &str = "123456";
const DEVICE: &str = "_30_83_98_aa_bb_cc__door1";

struct Harness {
    server: MockServer,
    host: String,
    router: Arc<NotificationRouter>,
    store: Arc<MemoryStore>,
}

impl Harness {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let host = server.address().to_string();
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "data": { "name": "notify_url" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "OK" })))
            .mount(&server)
            .await;
        Self {
            server,
            host,
            router: Arc::new(NotificationRouter::new()),
            store: Arc::new(MemoryStore::new()),
        }
    }

    fn context(&self) -> ReconcilerContext {
        ReconcilerContext {
            router: Arc::clone(&self.router),
            store: self.store.clone(),
            config: ReconcilerConfig {
                // Tests drive polls explicitly through `refresh()`.
                poll_interval: Duration::from_secs(3600),
                retry: RetryPolicy {
                    max_attempts: 3,
                    base_delay: Duration::from_millis(5),
                },
                callback_base: Url::parse("http://127.0.0.1:8787").unwrap(),
                ..ReconcilerConfig::default()
            },
        }
    }

    async fn start(&self, door_index: u8) -> StateReconciler {
        self.start_with(door_index, self.context()).await
    }

    async fn start_with(&self, door_index: u8, context: ReconcilerContext) -> StateReconciler {
        let identity = ControllerIdentity::new(self.host.clone(), SecretString::from(KEY.to_string()));
        StateReconciler::start(DEVICE, identity, door_index, context)
            .await
            .unwrap()
    }

    /// Context whose poll timer fires every `ms` milliseconds.
    fn timed_context(&self, ms: u64) -> ReconcilerContext {
        let mut context = self.context();
        context.config.poll_interval = Duration::from_millis(ms);
        context
    }

    async fn status_reads(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| String::from_utf8_lossy(&r.body).contains("dev_st"))
            .count()
    }

    /// Serve `status` for door1 on the next `times` status reads.
    async fn status_once(&self, door1: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path("/json"))
            .and(header("token", KEY))
            .and(body_partial_json(json!({ "data": { "name": "dev_st" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(status_body(door1)))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    async fn notify_url_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| {
                serde_json::from_slice::<serde_json::Value>(&r.body)
                    .is_ok_and(|b| b["data"]["name"] == "notify_url")
            })
            .count()
    }
}

fn status_body(door1: &str) -> serde_json::Value {
    json!({
        "result": "OK",
        "dev_id": "_30_83_98_aa_bb_cc_",
        "door_num": 2,
        "data": {
            "door1": { "index": 0, "status": door1, "lockup": 0, "disabled": 0 },
            "door2": { "index": 1, "status": "close", "lockup": 0, "disabled": 0 }
        }
    })
}

fn push(door1: &str, notify: Option<(u8, &str)>) -> NotificationPayload {
    let mut body = status_body(door1);
    if let Some((door_idx, event)) = notify {
        body["notify"] = json!({ "door_idx": door_idx, "event": event });
    }
    serde_json::from_value(body).unwrap()
}

// ── Poll reconciliation ─────────────────────────────────────────────

#[tokio::test]
async fn test_first_poll_sets_baseline_then_fires_once_per_transition() {
    let h = Harness::new().await;
    h.status_once("close", 1).await;
    h.status_once("open", 10).await;

    let reconciler = h.start(0).await;
    let mut triggers = reconciler.triggers();

    let snapshot = reconciler.snapshot();
    assert_eq!(snapshot.state, DoorState::Closed);
    assert_eq!(snapshot.availability, Availability::Available);

    reconciler.refresh().await;
    assert_eq!(reconciler.snapshot().state, DoorState::Open);
    assert_eq!(triggers.try_recv().unwrap(), DoorTrigger::DoorOpened);

    reconciler.refresh().await;
    assert_eq!(triggers.try_recv(), Err(TryRecvError::Empty));

    reconciler.stop().await;
}

#[tokio::test]
async fn test_failed_poll_marks_unavailable_and_recovers() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "data": { "name": "dev_st" } })))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .mount(&h.server)
        .await;
    h.status_once("close", 10).await;

    let reconciler = h.start(0).await;
    let snapshot = reconciler.snapshot();
    assert_eq!(snapshot.state, DoorState::Unknown);
    assert_eq!(
        snapshot.availability,
        Availability::Unavailable {
            reason: "Cannot reach controller".into()
        }
    );

    reconciler.refresh().await;
    let snapshot = reconciler.snapshot();
    assert!(snapshot.availability.is_available());
    assert_eq!(snapshot.state, DoorState::Closed);

    reconciler.stop().await;
}

#[tokio::test]
async fn test_timer_keeps_polling_after_a_failed_poll() {
    let h = Harness::new().await;
    // The startup fetch and the first timer poll both exhaust their retries.
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "data": { "name": "dev_st" } })))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(6)
        .mount(&h.server)
        .await;
    h.status_once("open", 100).await;

    let reconciler = h.start_with(0, h.timed_context(100)).await;
    assert!(!reconciler.snapshot().availability.is_available());

    let mut snapshots = reconciler.watch_snapshot();
    tokio::time::timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.availability.is_available() && s.state == DoorState::Open),
    )
    .await
    .expect("timer never produced a successful poll")
    .unwrap();
    assert!(h.status_reads().await >= 7);

    reconciler.stop().await;
}

#[tokio::test]
async fn test_stop_does_not_wait_for_slow_timer_poll() {
    let h = Harness::new().await;
    h.status_once("close", 1).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "data": { "name": "dev_st" } })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(status_body("open"))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&h.server)
        .await;

    let reconciler = h.start_with(0, h.timed_context(100)).await;
    let mut triggers = reconciler.triggers();
    // Let the timer start a poll that will hang on the controller.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = Instant::now();
    reconciler.stop().await;
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "stop() took {:?}",
        started.elapsed()
    );
    assert_eq!(reconciler.snapshot().state, DoorState::Closed);
    assert_eq!(triggers.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_successful_poll_reregisters_callback() {
    let h = Harness::new().await;
    h.status_once("close", 10).await;

    let reconciler = h.start(0).await;

    let mut registered = 0;
    for _ in 0..50 {
        registered = h.notify_url_requests().await;
        if registered > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(registered >= 1, "expected a notify_url registration");

    let requests = h.server.received_requests().await.unwrap();
    let registration = requests
        .iter()
        .map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).unwrap())
        .find(|b| b["data"]["name"] == "notify_url")
        .unwrap();
    assert_eq!(
        registration["data"]["value"]["url"],
        format!("http://127.0.0.1:8787/api/notification?host={}", h.host.replace(':', "%3A"))
    );

    reconciler.stop().await;
}

// ── Push reconciliation ─────────────────────────────────────────────

#[tokio::test]
async fn test_push_through_router_reconciles() {
    let h = Harness::new().await;
    h.status_once("close", 10).await;

    let reconciler = h.start(0).await;
    let mut triggers = reconciler.triggers();
    let mut watch = reconciler.watch_snapshot();
    watch.mark_unchanged();

    h.router.publish(push("open", Some((0, "open"))), Some(h.host.clone()));

    tokio::time::timeout(Duration::from_secs(2), watch.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reconciler.snapshot().state, DoorState::Open);
    assert_eq!(triggers.recv().await.unwrap(), DoorTrigger::DoorOpened);

    reconciler.stop().await;
}

#[tokio::test]
async fn test_push_for_other_host_is_ignored() {
    let h = Harness::new().await;
    h.status_once("close", 10).await;

    let reconciler = h.start(0).await;
    let mut triggers = reconciler.triggers();
    let before = reconciler.snapshot();

    reconciler
        .handle_notification(&push("open", Some((0, "lock"))), Some("ctrl-a.local"))
        .await;

    assert_eq!(reconciler.snapshot(), before);
    assert_eq!(triggers.try_recv(), Err(TryRecvError::Empty));

    reconciler.stop().await;
}

#[tokio::test]
async fn test_untagged_push_is_accepted() {
    let h = Harness::new().await;
    h.status_once("close", 10).await;

    let reconciler = h.start(0).await;
    reconciler.handle_notification(&push("open", None), None).await;
    assert!(reconciler.is_open());

    reconciler.stop().await;
}

#[tokio::test]
async fn test_push_then_poll_of_same_transition_fires_once() {
    let h = Harness::new().await;
    h.status_once("close", 1).await;
    h.status_once("open", 10).await;

    let reconciler = h.start(0).await;
    let mut triggers = reconciler.triggers();

    reconciler
        .handle_notification(&push("open", Some((0, "open"))), Some(&h.host))
        .await;
    reconciler.refresh().await;
    reconciler
        .handle_notification(&push("open", None), Some(&h.host))
        .await;

    assert_eq!(triggers.try_recv().unwrap(), DoorTrigger::DoorOpened);
    assert_eq!(triggers.try_recv(), Err(TryRecvError::Empty));

    reconciler.stop().await;
}

#[tokio::test]
async fn test_lock_event_fires_only_for_tracked_door() {
    let h = Harness::new().await;
    h.status_once("close", 10).await;

    let reconciler = h.start(0).await;
    let mut triggers = reconciler.triggers();

    reconciler
        .handle_notification(&push("close", Some((1, "lock"))), Some(&h.host))
        .await;
    assert_eq!(triggers.try_recv(), Err(TryRecvError::Empty));

    reconciler
        .handle_notification(&push("close", Some((0, "lock"))), Some(&h.host))
        .await;
    assert_eq!(triggers.try_recv().unwrap(), DoorTrigger::DoorLocked);

    reconciler.stop().await;
}

#[tokio::test]
async fn test_reboot_fires_and_reregisters() {
    let h = Harness::new().await;
    h.status_once("close", 10).await;

    let reconciler = h.start(1).await;
    let mut triggers = reconciler.triggers();

    // Let the startup registration land first.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let before = h.notify_url_requests().await;

    reconciler
        .handle_notification(&push("close", Some((0, "reboot"))), Some(&h.host))
        .await;
    assert_eq!(triggers.try_recv().unwrap(), DoorTrigger::ControllerRebooted);

    let mut after = before;
    for _ in 0..50 {
        after = h.notify_url_requests().await;
        if after > before {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(after > before, "reboot should re-register the callback");

    reconciler.stop().await;
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_issue_command_targets_tracked_door() {
    let h = Harness::new().await;
    h.status_once("close", 10).await;
    Mock::given(method("POST"))
        .and(header("token", KEY))
        .and(body_partial_json(json!({
            "product": "iQ3",
            "data": { "name": "door_op", "value": { "door_idx": 1, "cmd": "close" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "OK" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let reconciler = h.start(1).await;
    reconciler.close().await.unwrap();

    reconciler.stop().await;
}

// ── Teardown ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stop_unsubscribes_and_uninitializes() {
    let h = Harness::new().await;
    h.status_once("close", 10).await;

    let reconciler = h.start(0).await;
    assert_eq!(h.router.subscriber_count(), 1);

    reconciler.stop().await;
    assert_eq!(h.router.subscriber_count(), 0);

    let err = reconciler.open().await.unwrap_err();
    assert!(matches!(err, CoreError::Uninitialized));

    reconciler
        .handle_notification(&push("open", None), Some(&h.host))
        .await;
    assert_eq!(reconciler.snapshot().state, DoorState::Closed);
}

#[tokio::test]
async fn test_in_flight_poll_after_stop_is_discarded() {
    let h = Harness::new().await;
    h.status_once("close", 1).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "data": { "name": "dev_st" } })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(status_body("open"))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&h.server)
        .await;

    let reconciler = h.start(0).await;
    let mut triggers = reconciler.triggers();

    let polling = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    reconciler.stop().await;
    polling.await.unwrap();

    assert_eq!(reconciler.snapshot().state, DoorState::Closed);
    assert_eq!(triggers.try_recv(), Err(TryRecvError::Empty));
}

// ── Settings ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_settings_validation_rejects_before_network() {
    let h = Harness::new().await;
    h.status_once("close", 1).await;

    let reconciler = h.start(0).await;

    let err = reconciler
        .apply_settings(SettingsChange::host(""))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert_eq!(err.to_string(), INVALID_HOST);

    let err = reconciler
        .apply_settings(SettingsChange::secret("12345"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), INVALID_SECRET);

    // Only the startup poll reached the controller.
    assert_eq!(h.status_reads().await, 1);

    reconciler.stop().await;
}

#[tokio::test]
async fn test_failed_trial_changes_nothing() {
    let h = Harness::new().await;
    // Only the current key is accepted, so a trial with a new key fails.
    h.status_once("close", 10).await;

    let reconciler = h.start(0).await;

    let err = reconciler
        .apply_settings(SettingsChange::secret("654321"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Connectivity { .. }));
    assert_eq!(err.to_string(), TRIAL_FAILED);

    let identity = reconciler.identity().await;
    assert_eq!(identity.host, h.host);
    assert_eq!(identity.secret.expose_secret(), KEY);
    assert!(h.store.load_identity(DEVICE).unwrap().is_none());

    // The live client still authenticates with the old key.
    reconciler.refresh().await;
    assert!(reconciler.snapshot().availability.is_available());

    reconciler.stop().await;
}

#[tokio::test]
async fn test_successful_apply_commits_and_swaps_client() {
    let h = Harness::new().await;
    h.status_once("close", 1).await;
    Mock::given(method("POST"))
        .and(header("token", "654321"))
        .and(body_partial_json(json!({ "data": { "name": "dev_st" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("close")))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(header("token", "654321"))
        .and(body_partial_json(json!({ "data": { "name": "door_op" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "OK" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let reconciler = h.start(0).await;

    let message = reconciler
        .apply_settings(SettingsChange::secret("654321"))
        .await
        .unwrap();
    assert_eq!(message, SETTINGS_SAVED);

    let stored = h.store.load_identity(DEVICE).unwrap().unwrap();
    assert_eq!(stored.secret.expose_secret(), "654321");
    assert_eq!(stored.host, h.host);
    assert_eq!(reconciler.identity().await.secret.expose_secret(), "654321");

    reconciler.open().await.unwrap();
    reconciler.stop().await;
}

#[tokio::test]
async fn test_host_change_with_unreachable_host_changes_nothing() {
    let h = Harness::new().await;
    h.status_once("close", 10).await;

    let mut context = h.context();
    context.config.transport.timeout = Duration::from_millis(200);
    let reconciler = h.start_with(0, context).await;

    // TEST-NET-1: never routed.
    let err = reconciler
        .apply_settings(SettingsChange::host("192.0.2.1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Connectivity { .. }));
    assert_eq!(err.to_string(), TRIAL_FAILED);

    let identity = reconciler.identity().await;
    assert_eq!(identity.host, h.host);
    assert_eq!(identity.secret.expose_secret(), KEY);
    assert!(h.store.load_identity(DEVICE).unwrap().is_none());

    reconciler.stop().await;
}

#[tokio::test]
async fn test_host_change_persists_new_host() {
    let h = Harness::new().await;
    h.status_once("close", 10).await;

    // Route every command through the mock so the new hostname reaches it.
    let mut context = h.context();
    context.config.transport.proxy = Some(h.server.uri().parse().unwrap());
    let reconciler = h.start_with(0, context).await;

    let message = reconciler
        .apply_settings(SettingsChange::host("tailwind-new.local"))
        .await
        .unwrap();
    assert_eq!(message, SETTINGS_SAVED);

    let stored = h.store.load_identity(DEVICE).unwrap().unwrap();
    assert_eq!(stored.host, "tailwind-new.local");
    assert_eq!(stored.secret.expose_secret(), KEY);
    assert_eq!(reconciler.identity().await.host, "tailwind-new.local");

    let trial_reached_new_host = h
        .server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .any(|r| r.headers.get("host").is_some_and(|v| v == "tailwind-new.local"));
    assert!(trial_reached_new_host);

    reconciler.stop().await;
}

struct RejectingStore;

impl IdentityStore for RejectingStore {
    fn load_identity(&self, _: &str) -> Result<Option<ControllerIdentity>, CoreError> {
        Ok(None)
    }

    fn save_identity(&self, _: &str, _: &ControllerIdentity) -> Result<(), CoreError> {
        Err(CoreError::Store {
            message: "read-only".into(),
        })
    }
}

#[tokio::test]
async fn test_store_failure_leaves_identity_untouched() {
    let h = Harness::new().await;
    h.status_once("close", 10).await;

    let mut context = h.context();
    context.store = Arc::new(RejectingStore);
    let identity = ControllerIdentity::new(h.host.clone(), SecretString::from(KEY.to_string()));
    let reconciler = StateReconciler::start(DEVICE, identity, 0, context)
        .await
        .unwrap();

    // Re-entering the current key passes the trial, so the store is reached.
    let err = reconciler
        .apply_settings(SettingsChange::secret(KEY))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Store { .. }));
    assert_eq!(reconciler.identity().await.host, h.host);

    reconciler.stop().await;
}
