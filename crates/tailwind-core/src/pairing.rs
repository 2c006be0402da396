// Pairing: authenticate against a controller and list its enabled doors.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{info, warn};

use tailwind_api::{CommandClient, ResultCode, StatusResponse};

use crate::error::CoreError;
use crate::identity::ControllerIdentity;

pub const MISSING_CREDENTIALS: &str =
    "Please select a controller and enter your Local Control Key.";
pub const CONNECT_FAILED: &str = "Could not connect. Check IP address and Local Control Key.";
pub const CONTROLLER_ERROR: &str = "Controller returned an error. Check your Local Control Key.";

/// A door that can be added as a device.
#[derive(Debug, Clone, Serialize)]
pub struct PairableDoor {
    /// `Garage Door N`
    pub name: String,
    /// `{dev_id}_door{N}`, falling back to the host when `dev_id` is absent.
    pub id: String,
    pub door_index: u8,
    #[serde(skip)]
    pub identity: ControllerIdentity,
}

/// Fetch status with `client` and return every enabled door.
///
/// `client` must already carry the secret the user entered.
pub async fn list_doors(
    client: &CommandClient,
    host: &str,
    discovery_id: Option<&str>,
) -> Result<Vec<PairableDoor>, CoreError> {
    if host.is_empty() || client.secret().expose_secret().is_empty() {
        return Err(CoreError::validation(MISSING_CREDENTIALS));
    }

    info!(host, "authenticating for pairing");
    let status = client.get_status(host).await.map_err(|e| {
        warn!(host, error = %e, "pairing status fetch failed");
        CoreError::connectivity(CONNECT_FAILED)
    })?;

    if status.result != Some(ResultCode::Ok) {
        return Err(CoreError::Application {
            message: CONTROLLER_ERROR.into(),
        });
    }

    let mut identity = ControllerIdentity::new(host, client.secret().clone());
    identity.discovery_id = discovery_id.map(str::to_owned);

    let doors = doors_from_status(&status, &identity);
    if doors.is_empty() {
        return Err(CoreError::NoEnabledDoors);
    }
    info!(host, count = doors.len(), "pairable doors found");
    Ok(doors)
}

/// `door1..door{door_num}` entries that exist and are not disabled.
pub fn doors_from_status(status: &StatusResponse, identity: &ControllerIdentity) -> Vec<PairableDoor> {
    let dev_id = status.dev_id.as_deref().unwrap_or(&identity.host);
    let Some(doors) = status.data.as_ref() else {
        return Vec::new();
    };

    (1..=status.door_num.unwrap_or(0))
        .filter_map(|n| {
            let door = doors.get(&format!("door{n}"))?;
            (!door.is_disabled()).then(|| PairableDoor {
                name: format!("Garage Door {n}"),
                id: format!("{dev_id}_door{n}"),
                door_index: door.index,
                identity: identity.clone(),
            })
        })
        .collect()
}

/// Secret from user input, validated like a settings change.
pub fn parse_local_key(raw: &str) -> Result<SecretString, CoreError> {
    crate::settings::validate_secret(raw)?;
    Ok(SecretString::from(raw.to_owned()))
}
