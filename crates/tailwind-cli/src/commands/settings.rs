//! `tailwind settings`: change a paired door's host or key.
//!
//! The change is validated, tried against the controller, and only then
//! written back to the config file (or keyring).

use std::sync::Arc;

use secrecy::SecretString;

use tailwind_config::{Config, FileIdentityStore};
use tailwind_core::{
    NotificationRouter, ReconcilerConfig, ReconcilerContext, SettingsChange, StateReconciler,
};

use crate::cli::{GlobalOpts, SettingsArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(
    args: SettingsArgs,
    cfg: &Config,
    runtime: ReconcilerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let change = SettingsChange {
        controller_host: args.new_host,
        local_secret: args.new_key.map(SecretString::from),
    };
    if change.is_empty() {
        return Err(CliError::validation("settings", "pass --set-host and/or --set-key"));
    }

    let door = config::resolve_door(global, cfg)?;
    if !door.configured {
        return Err(CliError::validation(
            "door",
            "settings apply to paired doors; pair one with `tailwind pair --save` first",
        ));
    }

    let context = ReconcilerContext {
        router: Arc::new(NotificationRouter::new()),
        store: Arc::new(FileIdentityStore::new(config::config_file(global))),
        config: runtime,
    };
    let reconciler =
        StateReconciler::start(door.id, door.identity, door.door_index, context).await?;
    let result = reconciler.apply_settings(change).await;
    reconciler.stop().await;

    output::print_output(result?, global.quiet);
    Ok(())
}
