// ── Door state model ──
//
// The tri-state last-known position, the edge triggers it produces, and
// the snapshot published to the host through a watch channel.

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use tailwind_api::{DoorStatus, StatusResponse};

/// Reason shown when the status poll cannot reach the controller.
pub const UNREACHABLE_REASON: &str = "Cannot reach controller";

/// Last known door position. `Unknown` until the first observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DoorState {
    #[default]
    Unknown,
    Open,
    Closed,
}

impl DoorState {
    pub fn from_closed(closed: bool) -> Self {
        if closed { Self::Closed } else { Self::Open }
    }

    /// `Some(true)` when closed, `None` while unknown.
    pub fn is_closed(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Open => Some(false),
            Self::Closed => Some(true),
        }
    }

    /// Record an observation and return the edge trigger it produces.
    ///
    /// The first observation only establishes a baseline. Repeating the
    /// current value is a no-op.
    pub fn observe(&mut self, closed: bool) -> Option<DoorTrigger> {
        let next = Self::from_closed(closed);
        let previous = std::mem::replace(self, next);
        if previous == Self::Unknown || previous == next {
            None
        } else if closed {
            Some(DoorTrigger::DoorClosed)
        } else {
            Some(DoorTrigger::DoorOpened)
        }
    }
}

/// Events fired to the host's automation engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DoorTrigger {
    DoorOpened,
    DoorClosed,
    DoorLocked,
    ControllerRebooted,
}

/// Whether the door is currently controllable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Available,
    Unavailable { reason: String },
}

impl Availability {
    pub fn unreachable() -> Self {
        Self::Unavailable {
            reason: UNREACHABLE_REASON.to_owned(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// What the host sees for one door.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DoorSnapshot {
    pub state: DoorState,
    pub locked: bool,
    pub disabled: bool,
    pub availability: Availability,
}

impl DoorSnapshot {
    pub fn is_open(&self) -> bool {
        self.state == DoorState::Open
    }
}

/// One door's fields pulled out of a status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorObservation {
    pub closed: bool,
    pub locked: bool,
    pub disabled: bool,
}

impl DoorObservation {
    /// Look up `door{index+1}`. `None` when the report lacks that door.
    pub fn extract(status: &StatusResponse, door_index: u8) -> Option<Self> {
        status.door(door_index).map(Self::from)
    }
}

impl From<&DoorStatus> for DoorObservation {
    fn from(door: &DoorStatus) -> Self {
        Self {
            closed: door.is_closed(),
            locked: door.is_locked(),
            disabled: door.is_disabled(),
        }
    }
}
