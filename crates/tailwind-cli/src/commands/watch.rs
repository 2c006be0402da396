//! `tailwind watch`: run one reconciler per door behind a shared push
//! listener and stream what they report until Ctrl-C.
//!
//! Table and plain output print one line per event; the structured formats
//! print one compact JSON object per line.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tailwind_config::{Config, FileIdentityStore};
use tailwind_core::{
    DoorSnapshot, DoorTrigger, NotificationRouter, ReconcilerConfig, ReconcilerContext,
    StateReconciler,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::{self, ResolvedDoor};
use crate::error::CliError;
use crate::ingress;
use crate::output;

use super::callback::apply_callback_base;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Serialize)]
struct WatchEvent {
    timestamp: DateTime<Utc>,
    door: String,
    #[serde(flatten)]
    kind: WatchEventKind,
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WatchEventKind {
    Trigger { trigger: DoorTrigger },
    Snapshot { snapshot: DoorSnapshot },
}

impl WatchEvent {
    fn new(door: &str, kind: WatchEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            door: door.to_owned(),
            kind,
        }
    }

    fn render(&self, format: &OutputFormat, color: bool) -> String {
        match format {
            OutputFormat::Table | OutputFormat::Plain => {
                let time = self.timestamp.with_timezone(&Local).format("%H:%M:%S");
                match &self.kind {
                    WatchEventKind::Trigger { trigger } => {
                        format!("{time}  {:<24} {trigger}", self.door)
                    }
                    WatchEventKind::Snapshot { snapshot } => {
                        let mut line = format!(
                            "{time}  {:<24} {} {}",
                            self.door,
                            output::door_state(snapshot.state, color),
                            output::availability(&snapshot.availability, color),
                        );
                        if snapshot.locked {
                            line.push_str(" locked");
                        }
                        if snapshot.disabled {
                            line.push_str(" disabled");
                        }
                        line
                    }
                }
            }
            OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
                output::render_json_compact(self)
            }
        }
    }
}

pub async fn handle(
    args: WatchArgs,
    cfg: &Config,
    mut runtime: ReconcilerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    apply_callback_base(&mut runtime, args.callback_base.as_deref())?;
    if let Some(secs) = args.poll_interval {
        if secs == 0 {
            return Err(CliError::validation("poll_interval", "must be at least 1 second"));
        }
        runtime.poll_interval = Duration::from_secs(secs);
    }
    if runtime
        .callback_base
        .host_str()
        .is_some_and(|h| h == "localhost" || h.starts_with("127."))
    {
        warn!(
            callback = %runtime.callback_base,
            "callback URL is loopback; controllers will not reach it (set defaults.callback_base)"
        );
    }

    let doors = config::resolve_doors(global, cfg, &args.doors)?;
    let listen = args.listen.unwrap_or_else(|| cfg.defaults.listen.clone());

    let notifications = Arc::new(NotificationRouter::new());
    let context = ReconcilerContext {
        router: Arc::clone(&notifications),
        store: Arc::new(FileIdentityStore::new(config::config_file(global))),
        config: runtime,
    };

    // Listen before any reconciler registers this host as its callback.
    let listener = ingress::bind(&listen).await?;
    let cancel = CancellationToken::new();
    let server = tokio::spawn(ingress::serve(
        listener,
        ingress::router(Arc::clone(&notifications)),
        cancel.clone(),
    ));

    let reconcilers = match start_all(doors, &context).await {
        Ok(reconcilers) => reconcilers,
        Err(e) => {
            cancel.cancel();
            let _ = server.await;
            return Err(e);
        }
    };
    info!(doors = reconcilers.len(), %listen, "watching");

    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
    for (label, reconciler) in &reconcilers {
        tokio::spawn(forward_events(
            label.clone(),
            reconciler.triggers(),
            reconciler.watch_snapshot(),
            tx.clone(),
            cancel.clone(),
        ));
    }
    drop(tx);

    let color = output::should_color(&global.color);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = rx.recv() => match event {
                Some(event) => output::print_output(&event.render(&global.output, color), global.quiet),
                None => break,
            },
        }
    }

    info!("shutting down");
    cancel.cancel();
    for (_, reconciler) in &reconcilers {
        reconciler.stop().await;
    }
    match server.await {
        Ok(Err(e)) => warn!(error = %e, "notification listener failed"),
        Err(e) => warn!(error = %e, "notification listener task panicked"),
        Ok(Ok(())) => {}
    }
    Ok(())
}

async fn start_all(
    doors: Vec<ResolvedDoor>,
    context: &ReconcilerContext,
) -> Result<Vec<(String, StateReconciler)>, CliError> {
    let mut started: Vec<(String, StateReconciler)> = Vec::with_capacity(doors.len());
    for door in doors {
        let label = door.name.unwrap_or_else(|| door.id.clone());
        match StateReconciler::start(door.id, door.identity, door.door_index, context.clone()).await
        {
            Ok(reconciler) => started.push((label, reconciler)),
            Err(e) => {
                for (_, reconciler) in &started {
                    reconciler.stop().await;
                }
                return Err(e.into());
            }
        }
    }
    Ok(started)
}

/// Relay one reconciler's snapshots and triggers into the shared channel.
async fn forward_events(
    label: String,
    mut triggers: broadcast::Receiver<DoorTrigger>,
    mut snapshots: watch::Receiver<DoorSnapshot>,
    tx: mpsc::Sender<WatchEvent>,
    cancel: CancellationToken,
) {
    let initial = snapshots.borrow_and_update().clone();
    if tx
        .send(WatchEvent::new(&label, WatchEventKind::Snapshot { snapshot: initial }))
        .await
        .is_err()
    {
        return;
    }

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            trigger = triggers.recv() => match trigger {
                Ok(trigger) => WatchEventKind::Trigger { trigger },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(door = %label, skipped = n, "trigger stream lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                WatchEventKind::Snapshot { snapshot: snapshots.borrow_and_update().clone() }
            }
        };
        if tx.send(WatchEvent::new(&label, event)).await.is_err() {
            break;
        }
    }
}
