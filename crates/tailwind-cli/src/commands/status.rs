//! `tailwind status`: one `dev_st` round trip, rendered.

use serde::Serialize;
use tabled::Tabled;

use tailwind_api::StatusResponse;
use tailwind_config::Config;
use tailwind_core::{CoreError, DoorState, ReconcilerConfig};

use crate::cli::GlobalOpts;
use crate::config::{self, ResolvedDoor};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct StatusView {
    door: String,
    host: String,
    dev_id: Option<String>,
    product: Option<String>,
    firmware: Option<String>,
    rssi: Option<i32>,
    doors: Vec<DoorView>,
}

#[derive(Debug, Serialize)]
struct DoorView {
    key: String,
    index: u8,
    state: DoorState,
    locked: bool,
    disabled: bool,
    /// The door this command was pointed at.
    selected: bool,
}

#[derive(Tabled)]
struct DoorRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Door")]
    key: String,
    #[tabled(rename = "Index")]
    index: u8,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Locked")]
    locked: &'static str,
    #[tabled(rename = "Disabled")]
    disabled: &'static str,
}

fn status_view(door: &ResolvedDoor, status: StatusResponse) -> StatusView {
    let doors = status
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(key, d)| DoorView {
            selected: d.index == door.door_index,
            state: DoorState::from_closed(d.is_closed()),
            locked: d.is_locked(),
            disabled: d.is_disabled(),
            index: d.index,
            key,
        })
        .collect();

    StatusView {
        door: door.id.clone(),
        host: door.identity.host.clone(),
        dev_id: status.dev_id,
        product: status.product,
        firmware: status.fw_ver,
        rssi: status.router_rssi,
        doors,
    }
}

fn detail(view: &StatusView, color: bool) -> String {
    let mut lines = vec![
        format!("Controller  {}", view.dev_id.as_deref().unwrap_or("-")),
        format!("Host        {}", view.host),
    ];
    if let Some(ref product) = view.product {
        lines.push(format!(
            "Product     {product} (fw {})",
            view.firmware.as_deref().unwrap_or("?")
        ));
    }
    if let Some(rssi) = view.rssi {
        lines.push(format!("Signal      {rssi} dBm"));
    }

    let rows: Vec<DoorRow> = view
        .doors
        .iter()
        .map(|d| DoorRow {
            marker: if d.selected { "*" } else { "" },
            key: d.key.clone(),
            index: d.index,
            state: output::door_state(d.state, color),
            locked: output::yes_no(d.locked),
            disabled: output::yes_no(d.disabled),
        })
        .collect();
    lines.push(String::new());
    lines.push(output::render_table(&rows));
    lines.join("\n")
}

pub async fn handle(
    cfg: &Config,
    runtime: &ReconcilerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let door = config::resolve_door(global, cfg)?;
    let client = runtime.build_client(door.identity.secret.clone())?;
    let status = client
        .get_status(&door.identity.host)
        .await
        .map_err(CoreError::from)?;

    let view = status_view(&door, status);
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &view,
        |v| detail(v, color),
        |v| {
            v.doors
                .iter()
                .find(|d| d.selected)
                .map_or_else(|| DoorState::Unknown.to_string(), |d| d.state.to_string())
        },
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
