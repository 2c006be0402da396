//! `tailwind notify` posts a synthetic controller push to a running
//! listener; `tailwind notifications` reads back its recent log.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use url::Url;

use tailwind_api::{DoorPosition, DoorStatus, Notify, NotifyEvent, ResultCode, StatusResponse};
use tailwind_core::{NotificationPayload, ReconcilerConfig};

use crate::cli::{GlobalOpts, NotificationsArgs, NotifyArgs};
use crate::error::CliError;
use crate::output;

/// Payload shaped like a real push: doors `door1..=door{door_idx+1}`, the
/// target door at `status` (following the event when unset), the rest
/// closed.
pub fn test_payload(
    event: NotifyEvent,
    door_idx: u8,
    dev_id: &str,
    status: Option<DoorPosition>,
) -> NotificationPayload {
    let position = status.unwrap_or(if event == NotifyEvent::Close {
        DoorPosition::Close
    } else {
        DoorPosition::Open
    });

    let data = (0..=door_idx)
        .map(|index| {
            let door = DoorStatus {
                index,
                status: if index == door_idx {
                    position
                } else {
                    DoorPosition::Close
                },
                lockup: 0,
                disabled: 0,
            };
            (StatusResponse::door_key(index), door)
        })
        .collect();

    NotificationPayload {
        status: StatusResponse {
            result: Some(ResultCode::Ok),
            dev_id: Some(dev_id.to_owned()),
            door_num: Some(door_idx.saturating_add(1)),
            data: Some(data),
            ..StatusResponse::default()
        },
        notify: Some(Notify { door_idx, event }),
    }
}

fn parse_base(raw: &str) -> Result<Url, CliError> {
    raw.parse()
        .map_err(|_| CliError::validation("url", format!("invalid URL: {raw}")))
}

pub async fn handle(args: NotifyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let target = ReconcilerConfig {
        callback_base: parse_base(&args.url)?,
        ..ReconcilerConfig::default()
    }
    .callback_url(&args.source)?;

    let payload = test_payload(
        args.event.into(),
        args.door_idx,
        &args.dev_id,
        args.status.map(Into::into),
    );

    tracing::debug!(url = %target, "posting test notification");
    let response = reqwest::Client::new()
        .post(target.clone())
        .json(&payload)
        .send()
        .await
        .map_err(|e| CliError::ConnectionFailed {
            message: format!("Could not reach listener at {target}: {e}"),
        })?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(CliError::ConnectionFailed {
            message: format!("Listener answered HTTP {status}: {body}"),
        });
    }

    output::print_output(&body, global.quiet);
    Ok(())
}

// ── Notification log ─────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    payload: NotificationPayload,
    timestamp: DateTime<Utc>,
}

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "Received")]
    received: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Door")]
    door: String,
}

fn log_row(entry: &LogEntry) -> LogRow {
    let notify = entry.payload.notify;
    LogRow {
        received: entry
            .timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        device: entry
            .payload
            .status
            .dev_id
            .clone()
            .unwrap_or_else(|| "-".into()),
        event: notify.map_or("status", |n| n.event.as_str()).to_owned(),
        door: notify.map_or_else(|| "-".into(), |n| StatusResponse::door_key(n.door_idx)),
    }
}

pub async fn show_log(args: &NotificationsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut url = parse_base(&args.url)?;
    url.path_segments_mut()
        .map_err(|()| CliError::validation("url", format!("not a base URL: {}", args.url)))?
        .pop_if_empty()
        .extend(["api", "notifications"]);

    let response = reqwest::get(url.clone())
        .await
        .map_err(|e| CliError::ConnectionFailed {
            message: format!("Could not reach listener at {url}: {e}"),
        })?
        .error_for_status()?;
    let entries: Vec<LogEntry> = response.json().await?;

    let out = output::render_list(&global.output, &entries, log_row, |e| {
        e.timestamp.to_rfc3339()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn close_event_reports_the_door_closed() {
        let payload = test_payload(NotifyEvent::Close, 1, "test_controller", None);

        assert_eq!(payload.status.door_num, Some(2));
        assert_eq!(payload.status.dev_id.as_deref(), Some("test_controller"));
        assert!(payload.status.door(0).unwrap().is_closed());
        assert!(payload.status.door(1).unwrap().is_closed());
        assert_eq!(
            payload.notify,
            Some(Notify {
                door_idx: 1,
                event: NotifyEvent::Close
            })
        );
    }

    #[test]
    fn other_events_default_to_open() {
        let payload = test_payload(NotifyEvent::Lock, 0, "x", None);
        assert!(!payload.status.door(0).unwrap().is_closed());

        let payload = test_payload(NotifyEvent::Reboot, 0, "x", Some(DoorPosition::Close));
        assert!(payload.status.door(0).unwrap().is_closed());
    }

    #[test]
    fn payload_serializes_flat_with_notify_block() {
        let value = serde_json::to_value(test_payload(NotifyEvent::Open, 0, "abc", None)).unwrap();
        assert_eq!(value["result"], "OK");
        assert_eq!(value["data"]["door1"]["status"], "open");
        assert_eq!(value["notify"]["event"], "open");
    }

    #[test]
    fn log_rows_fall_back_for_plain_status_pushes() {
        let entry = LogEntry {
            payload: NotificationPayload::default(),
            timestamp: Utc::now(),
        };
        let row = log_row(&entry);
        assert_eq!(row.event, "status");
        assert_eq!(row.device, "-");
        assert_eq!(row.door, "-");
    }
}
