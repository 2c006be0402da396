//! Door resolution: config file + CLI overrides -> `tailwind_core` types.
//!
//! `--host` without a configured door builds an ad-hoc door keyed by the
//! host itself, so one-shot commands work before anything is paired.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use tailwind_config::{
    Config, ConfigError, DoorProfile, config_path, load_config_file, load_config_from,
    resolve_local_key,
};
use tailwind_core::{ControllerIdentity, ReconcilerConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// A door ready to be talked to.
#[derive(Debug, Clone)]
pub struct ResolvedDoor {
    pub id: String,
    pub name: Option<String>,
    pub identity: ControllerIdentity,
    pub door_index: u8,
    /// Whether the door exists in the config file (and can be persisted).
    pub configured: bool,
}

pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config_from(&config_file(global))?)
}

/// The file alone, without `TAILWIND_` overrides, for commands that write
/// it back.
pub fn load_file(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config_file(&config_file(global))?)
}

/// Runtime settings from `[defaults]`, with `--timeout` applied.
pub fn reconciler_config(global: &GlobalOpts, cfg: &Config) -> Result<ReconcilerConfig, CliError> {
    let mut runtime = cfg.defaults.reconciler_config()?;
    if let Some(secs) = global.timeout {
        runtime.transport.timeout = Duration::from_secs(secs);
    }
    Ok(runtime)
}

/// The door a one-shot command targets.
pub fn resolve_door(global: &GlobalOpts, cfg: &Config) -> Result<ResolvedDoor, CliError> {
    if global.door.is_none() {
        if let Some(ref host) = global.host {
            return ad_hoc_door(global, host);
        }
    }
    configured_door(global, cfg, global.door.as_deref())
}

/// Every door `watch` should follow: the named ones, else all configured
/// doors, else the ad-hoc `--host` door.
pub fn resolve_doors(
    global: &GlobalOpts,
    cfg: &Config,
    names: &[String],
) -> Result<Vec<ResolvedDoor>, CliError> {
    if !names.is_empty() {
        return names
            .iter()
            .map(|name| configured_door(global, cfg, Some(name)))
            .collect();
    }
    if global.door.is_some() || cfg.doors.is_empty() {
        return resolve_door(global, cfg).map(|door| vec![door]);
    }
    cfg.doors
        .iter()
        .map(|(id, profile)| door_from_profile(global, id, profile, false))
        .collect()
}

fn configured_door(
    global: &GlobalOpts,
    cfg: &Config,
    name: Option<&str>,
) -> Result<ResolvedDoor, CliError> {
    let (id, profile) = cfg.door(name).map_err(|err| match err {
        ConfigError::UnknownDoor { door } => CliError::DoorNotFound {
            door,
            available: available_doors(cfg),
        },
        other => other.into(),
    })?;
    door_from_profile(global, id, profile, true)
}

/// Build a door from its profile. `with_overrides` applies `--host`,
/// `--local-key`, and `--door-index`; `watch` over many doors skips them.
fn door_from_profile(
    global: &GlobalOpts,
    id: &str,
    profile: &DoorProfile,
    with_overrides: bool,
) -> Result<ResolvedDoor, CliError> {
    let host = match global.host {
        Some(ref host) if with_overrides => host.clone(),
        _ => profile.controller_host.clone(),
    };
    if host.is_empty() {
        return Err(CliError::validation(
            "controller_host",
            format!("door '{id}' has no controller host"),
        ));
    }

    let secret = match global.local_key {
        Some(ref key) if with_overrides => SecretString::from(key.clone()),
        _ => resolve_local_key(profile, id)?.0,
    };

    let mut identity = ControllerIdentity::new(host, secret);
    identity.discovery_id.clone_from(&profile.discovery_id);

    Ok(ResolvedDoor {
        id: id.to_owned(),
        name: profile.name.clone(),
        identity,
        door_index: global
            .door_index
            .filter(|_| with_overrides)
            .unwrap_or(profile.door_index),
        configured: true,
    })
}

fn ad_hoc_door(global: &GlobalOpts, host: &str) -> Result<ResolvedDoor, CliError> {
    let key = global
        .local_key
        .as_ref()
        .ok_or_else(|| CliError::NoLocalKey { door: host.into() })?;

    Ok(ResolvedDoor {
        id: host.to_owned(),
        name: None,
        identity: ControllerIdentity::new(host, SecretString::from(key.clone())),
        door_index: global.door_index.unwrap_or(0),
        configured: false,
    })
}

pub fn available_doors(cfg: &Config) -> String {
    if cfg.doors.is_empty() {
        "(none)".into()
    } else {
        cfg.doors.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
