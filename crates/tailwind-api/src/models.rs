// Local control API request and response types
//
// Every request is a versioned command envelope POSTed to `/json`. Status
// responses and push notifications share one shape; fields use
// `#[serde(default)]` because firmware revisions differ in what they send.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Protocol version carried by every command.
pub const PROTOCOL_VERSION: &str = "0.1";

/// Product tag carried by mutating (`set`) commands.
pub const PRODUCT: &str = "iQ3";

// ── Command envelope ─────────────────────────────────────────────────

/// The versioned command envelope.
///
/// ```json
/// { "version": "0.1", "product": "iQ3",
///   "data": { "type": "set", "name": "door_op", "value": { ... } } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<&'static str>,
    pub data: CommandData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandData {
    #[serde(rename = "type")]
    pub kind: CommandKind,
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Get,
    Set,
}

impl Command {
    /// A read command. Reads never carry the product tag.
    pub fn get(name: &'static str) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            product: None,
            data: CommandData {
                kind: CommandKind::Get,
                name,
                value: None,
            },
        }
    }

    /// A mutating command, tagged with the product.
    pub fn set(name: &'static str, value: serde_json::Value) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            product: Some(PRODUCT),
            data: CommandData {
                kind: CommandKind::Set,
                name,
                value: Some(value),
            },
        }
    }

    /// `dev_st`: controller and door status.
    pub fn device_status() -> Self {
        Self::get("dev_st")
    }

    /// `door_op`: open or close one door.
    pub fn door_operation(door_index: u8, action: DoorAction) -> Self {
        Self::set(
            "door_op",
            json!({ "door_idx": door_index, "cmd": action.as_str() }),
        )
    }

    /// `notify_url`: point push notifications at `url`.
    pub fn register_notify_url(url: &str) -> Self {
        Self::set(
            "notify_url",
            json!({ "enable": 1, "proto": "http", "url": url }),
        )
    }

    /// `notify_url` with `enable: 0`: stop push notifications.
    pub fn unregister_notify_url() -> Self {
        Self::set("notify_url", json!({ "enable": 0 }))
    }
}

/// Door operation requested through `door_op`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorAction {
    Open,
    Close,
}

impl DoorAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
        }
    }
}

// ── Responses ────────────────────────────────────────────────────────

/// `result` field present on every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    #[serde(rename = "OK")]
    Ok,
    Fail,
}

/// Minimal view of any response, used to detect `Fail` before decoding the
/// full payload.
#[derive(Debug, Deserialize)]
pub(crate) struct ResultEnvelope {
    #[serde(default)]
    pub result: Option<ResultCode>,
    #[serde(default)]
    pub info: Option<String>,
}

/// Response to mutating commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub result: ResultCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

/// Per-door map keyed `door1`, `door2`, `door3`.
pub type DoorMap = BTreeMap<String, DoorStatus>;

/// Full controller status from `dev_st`. Push notifications carry the same
/// fields (see [`NotificationPayload`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto_ver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door_num: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fw_ver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led_brightness: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_rssi: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_monitor: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DoorMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl StatusResponse {
    /// Map key for a zero-based door index (`0` -> `door1`).
    pub fn door_key(index: u8) -> String {
        format!("door{}", u16::from(index) + 1)
    }

    /// Status entry for a zero-based door index, if the controller sent one.
    pub fn door(&self, index: u8) -> Option<&DoorStatus> {
        self.data.as_ref()?.get(&Self::door_key(index))
    }
}

/// Status of a single door.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorStatus {
    pub index: u8,
    pub status: DoorPosition,
    /// 1 when the door is locked out.
    #[serde(default)]
    pub lockup: u8,
    /// 1 when the door is disabled on the controller.
    #[serde(default)]
    pub disabled: u8,
}

impl DoorStatus {
    pub fn is_closed(&self) -> bool {
        self.status == DoorPosition::Close
    }

    pub fn is_locked(&self) -> bool {
        self.lockup != 0
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled != 0
    }
}

/// Reported door position. Anything other than `close` counts as open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorPosition {
    Open,
    Close,
    #[serde(other)]
    Unknown,
}

// ── Push notifications ───────────────────────────────────────────────

/// Body the controller POSTs to the registered callback URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(flatten)]
    pub status: StatusResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<Notify>,
}

/// Explicit event descriptor attached to a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notify {
    pub door_idx: u8,
    pub event: NotifyEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyEvent {
    Open,
    Close,
    Lock,
    Enable,
    Disable,
    Reboot,
}

impl NotifyEvent {
    pub const ALL: [Self; 6] = [
        Self::Open,
        Self::Close,
        Self::Lock,
        Self::Enable,
        Self::Disable,
        Self::Reboot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Lock => "lock",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Reboot => "reboot",
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
