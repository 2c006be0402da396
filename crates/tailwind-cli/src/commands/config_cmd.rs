//! Config command handlers. None of these talk to a controller.

use secrecy::SecretString;

use tailwind_config::{Config, save_config_to, store_local_key};
use tailwind_core::pairing;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_file(global);

    match args.command {
        ConfigCommand::Show => {
            let cfg = redacted(config::load(global)?);
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_default(),
                |c| c.doors.keys().cloned().collect::<Vec<_>>().join("\n"),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetKey {
            door_id,
            key,
            keyring,
        } => {
            let secret: SecretString = pairing::parse_local_key(&key)?;
            let mut cfg = config::load_file(global)?;
            let available = config::available_doors(&cfg);
            let profile = cfg
                .doors
                .get_mut(&door_id)
                .ok_or_else(|| CliError::DoorNotFound {
                    door: door_id.clone(),
                    available,
                })?;

            if keyring {
                store_local_key(&door_id, &secret)?;
                profile.local_key = None;
            } else {
                profile.local_key = Some(key);
            }
            profile.local_key_env = None;
            save_config_to(&cfg, &path)?;

            let place = if keyring { "system keyring" } else { "config file" };
            output::print_output(&format!("Local key for '{door_id}' saved to {place}"), global.quiet);
            Ok(())
        }

        ConfigCommand::SetDefault { door_id } => {
            let mut cfg = config::load_file(global)?;
            ensure_door(&cfg, &door_id)?;
            cfg.default_door = Some(door_id.clone());
            save_config_to(&cfg, &path)?;
            output::print_output(&format!("Default door set to '{door_id}'"), global.quiet);
            Ok(())
        }

        ConfigCommand::Remove { door_id } => {
            let mut cfg = config::load_file(global)?;
            ensure_door(&cfg, &door_id)?;
            cfg.doors.remove(&door_id);
            if cfg.default_door.as_deref() == Some(door_id.as_str()) {
                cfg.default_door = None;
            }
            save_config_to(&cfg, &path)?;
            output::print_output(&format!("Door '{door_id}' removed"), global.quiet);
            Ok(())
        }
    }
}

fn ensure_door(cfg: &Config, door_id: &str) -> Result<(), CliError> {
    if cfg.doors.contains_key(door_id) {
        Ok(())
    } else {
        Err(CliError::DoorNotFound {
            door: door_id.into(),
            available: config::available_doors(cfg),
        })
    }
}

fn redacted(mut cfg: Config) -> Config {
    for profile in cfg.doors.values_mut() {
        if profile.local_key.is_some() {
            profile.local_key = Some(REDACTED.into());
        }
    }
    cfg
}
