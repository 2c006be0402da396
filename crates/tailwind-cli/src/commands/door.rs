//! `tailwind open` / `tailwind close`.

use serde::Serialize;

use tailwind_api::DoorAction;
use tailwind_config::Config;
use tailwind_core::{CoreError, ReconcilerConfig};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct DoorCommandResult {
    door: String,
    door_index: u8,
    action: DoorAction,
    result: &'static str,
}

pub async fn handle(
    action: DoorAction,
    cfg: &Config,
    runtime: &ReconcilerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let door = config::resolve_door(global, cfg)?;
    let client = runtime.build_client(door.identity.secret.clone())?;

    client
        .control_door(&door.identity.host, door.door_index, action)
        .await
        .map_err(CoreError::from)?;

    let result = DoorCommandResult {
        door: door.name.clone().unwrap_or(door.id),
        door_index: door.door_index,
        action,
        result: "OK",
    };
    let out = output::render_single(
        &global.output,
        &result,
        |r| format!("{}: {} sent", r.door, r.action.as_str()),
        |r| r.result.to_owned(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
