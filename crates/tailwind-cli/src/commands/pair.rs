//! `tailwind pair`: authenticate, list enabled doors, optionally save them.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use tailwind_config::{DoorProfile, save_config_to, store_local_key};
use tailwind_core::{PairableDoor, ReconcilerConfig, pairing};

use crate::cli::{GlobalOpts, PairArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct PairedDoor {
    #[serde(flatten)]
    door: PairableDoor,
    saved: bool,
}

#[derive(Tabled)]
struct PairRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Index")]
    index: u8,
    #[tabled(rename = "Saved")]
    saved: &'static str,
}

pub async fn handle(
    args: PairArgs,
    runtime: &ReconcilerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let host = global.host.clone().unwrap_or_default();
    let secret = match global.local_key.as_deref() {
        Some(key) if !key.is_empty() => pairing::parse_local_key(key)?,
        _ => SecretString::from(String::new()),
    };

    let client = runtime.build_client(secret)?;
    let doors = pairing::list_doors(&client, &host, args.discovery_id.as_deref()).await?;

    if args.save {
        let mut cfg = config::load_file(global)?;
        for door in &doors {
            let local_key = if args.keyring {
                store_local_key(&door.id, &door.identity.secret)?;
                None
            } else {
                Some(door.identity.secret.expose_secret().to_owned())
            };
            cfg.doors.insert(
                door.id.clone(),
                DoorProfile {
                    controller_host: door.identity.host.clone(),
                    local_key,
                    local_key_env: None,
                    door_index: door.door_index,
                    discovery_id: door.identity.discovery_id.clone(),
                    name: Some(door.name.clone()),
                },
            );
        }
        if cfg.default_door.is_none() {
            cfg.default_door = doors.first().map(|d| d.id.clone());
        }
        let path = config::config_file(global);
        save_config_to(&cfg, &path)?;
        info!(count = doors.len(), path = %path.display(), "paired doors saved");
    }

    let paired: Vec<PairedDoor> = doors
        .into_iter()
        .map(|door| PairedDoor {
            door,
            saved: args.save,
        })
        .collect();
    let out = output::render_list(
        &global.output,
        &paired,
        |p| PairRow {
            name: p.door.name.clone(),
            id: p.door.id.clone(),
            index: p.door.door_index,
            saved: output::yes_no(p.saved),
        },
        |p| p.door.id.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
