//! Shared configuration for Tailwind tools.
//!
//! TOML door profiles, local-key resolution (env + keyring + plaintext),
//! translation to `tailwind_core` types, and [`FileIdentityStore`], the
//! config-file implementation of the committed identity store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use tailwind_core::{
    ControllerIdentity, CoreError, IdentityStore, ReconcilerConfig, RetryPolicy, TransportConfig,
};

const KEYRING_SERVICE: &str = "tailwind";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no local key configured for door '{door}'")]
    NoLocalKey { door: String },

    #[error("door '{door}' not found in config")]
    UnknownDoor { door: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        CoreError::Store {
            message: err.to_string(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Door used when none is named on the command line.
    pub default_door: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Paired doors, keyed by device id.
    #[serde(default)]
    pub doors: BTreeMap<String, DoorProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_door: None,
            defaults: Defaults::default(),
            doors: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Resolve a door by name, falling back to `default_door`, then to the
    /// only configured door.
    pub fn door(&self, name: Option<&str>) -> Result<(&str, &DoorProfile), ConfigError> {
        let wanted = name.or(self.default_door.as_deref());
        match wanted {
            Some(id) => self
                .doors
                .get_key_value(id)
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| ConfigError::UnknownDoor { door: id.into() }),
            None if self.doors.len() == 1 => self
                .doors
                .iter()
                .next()
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| ConfigError::UnknownDoor {
                    door: "default".into(),
                }),
            None => Err(ConfigError::UnknownDoor {
                door: "default".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Status poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// URL the controller should POST push notifications to.
    #[serde(default = "default_callback_base")]
    pub callback_base: String,

    /// Bind address for the push ingress.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// HTTP proxy for reaching controllers on another network segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            callback_base: default_callback_base(),
            listen: default_listen(),
            proxy: None,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    30
}
fn default_callback_base() -> String {
    tailwind_core::config::DEFAULT_CALLBACK_BASE.into()
}
fn default_listen() -> String {
    "0.0.0.0:8787".into()
}

impl Defaults {
    /// Build the runtime settings every reconciler shares.
    pub fn reconciler_config(&self) -> Result<ReconcilerConfig, ConfigError> {
        let callback_base = self
            .callback_base
            .parse()
            .map_err(|_| ConfigError::Validation {
                field: "callback_base".into(),
                reason: format!("invalid URL: {}", self.callback_base),
            })?;
        if self.poll_interval == 0 {
            return Err(ConfigError::Validation {
                field: "poll_interval".into(),
                reason: "must be at least 1 second".into(),
            });
        }

        let proxy = match self.proxy.as_deref() {
            Some(raw) => Some(raw.parse().map_err(|_| ConfigError::Validation {
                field: "proxy".into(),
                reason: format!("invalid URL: {raw}"),
            })?),
            None => None,
        };

        Ok(ReconcilerConfig {
            poll_interval: Duration::from_secs(self.poll_interval),
            transport: TransportConfig {
                timeout: Duration::from_secs(self.timeout),
                proxy,
            },
            retry: RetryPolicy::default(),
            callback_base,
        })
    }
}

/// One paired door.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DoorProfile {
    /// Controller hostname or IP. Older configs used `controller_hostname`
    /// or `controller_ip`.
    #[serde(alias = "controller_hostname", alias = "controller_ip")]
    pub controller_host: String,

    /// Local control key (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_key: Option<String>,

    /// Environment variable holding the local control key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_key_env: Option<String>,

    /// Zero-based door index on the controller.
    #[serde(default)]
    pub door_index: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_id: Option<String>,

    /// Display name (`Garage Door 1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "tailwind", "tailwind").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tailwind");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load config from `path`, with `TAILWIND_` environment overrides
/// (`TAILWIND_DEFAULTS__POLL_INTERVAL=10`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TAILWIND_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load only what is written in `path`, for load-modify-save cycles that
/// must not persist environment overrides.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Write `cfg` to `path` through a temporary file, so readers never see a
/// half-written config.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    let staging = path.with_extension("toml.tmp");
    std::fs::write(&staging, toml_str)?;
    std::fs::rename(&staging, path)?;
    Ok(())
}

// ── Local key resolution ────────────────────────────────────────────

/// Where a door's local key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Env,
    Keyring,
    Plaintext,
}

fn keyring_entry(door_id: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{door_id}/local-key"))
}

/// Resolve a door's local key: `local_key_env` variable, then the system
/// keyring, then plaintext in the config.
pub fn resolve_local_key(
    profile: &DoorProfile,
    door_id: &str,
) -> Result<(SecretString, KeySource), ConfigError> {
    // 1. Profile's local_key_env → env var lookup
    if let Some(ref env_name) = profile.local_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok((SecretString::from(val), KeySource::Env));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(door_id) {
        if let Ok(secret) = entry.get_password() {
            return Ok((SecretString::from(secret), KeySource::Keyring));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = profile.local_key {
        return Ok((SecretString::from(key.clone()), KeySource::Plaintext));
    }

    Err(ConfigError::NoLocalKey {
        door: door_id.into(),
    })
}

/// Store a door's local key in the system keyring.
pub fn store_local_key(door_id: &str, key: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(door_id)?.set_password(key.expose_secret())?;
    Ok(())
}

/// Build the identity a reconciler is started with.
pub fn door_identity(profile: &DoorProfile, door_id: &str) -> Result<ControllerIdentity, ConfigError> {
    if profile.controller_host.is_empty() {
        return Err(ConfigError::Validation {
            field: "controller_host".into(),
            reason: format!("door '{door_id}' has no controller host"),
        });
    }
    let (secret, _) = resolve_local_key(profile, door_id)?;
    let mut identity = ControllerIdentity::new(profile.controller_host.clone(), secret);
    identity.discovery_id.clone_from(&profile.discovery_id);
    Ok(identity)
}

// ── File-backed identity store ──────────────────────────────────────

/// [`IdentityStore`] persisting into `config.toml`.
///
/// The host goes into the door's table. A changed key goes back to
/// wherever it was read from, except that an env-sourced key becomes
/// plaintext (the process cannot rewrite its own environment).
#[derive(Debug)]
pub struct FileIdentityStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn restore(&self, previous: Option<&str>) {
        let result = match previous {
            Some(text) => std::fs::write(&self.path, text),
            None => std::fs::remove_file(&self.path),
        };
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "could not roll back config file");
        }
    }
}

impl IdentityStore for FileIdentityStore {
    fn load_identity(&self, device_id: &str) -> Result<Option<ControllerIdentity>, CoreError> {
        let config = load_config_from(&self.path)?;
        config
            .doors
            .get(device_id)
            .map(|profile| door_identity(profile, device_id))
            .transpose()
            .map_err(CoreError::from)
    }

    fn save_identity(
        &self,
        device_id: &str,
        identity: &ControllerIdentity,
    ) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut config = load_config_file(&self.path)?;
        let profile = config
            .doors
            .get_mut(device_id)
            .ok_or_else(|| ConfigError::UnknownDoor {
                door: device_id.into(),
            })?;

        let current = resolve_local_key(profile, device_id).ok();
        let key_changed = current
            .as_ref()
            .is_none_or(|(key, _)| key.expose_secret() != identity.secret.expose_secret());

        let mut keyring_update = false;
        if key_changed {
            match current.map(|(_, source)| source) {
                Some(KeySource::Keyring) => keyring_update = true,
                Some(KeySource::Env) => {
                    warn!(door = device_id, "local key came from the environment; saving it to the config file");
                    profile.local_key_env = None;
                    profile.local_key = Some(identity.secret.expose_secret().to_owned());
                }
                Some(KeySource::Plaintext) | None => {
                    profile.local_key = Some(identity.secret.expose_secret().to_owned());
                }
            }
        }
        profile.controller_host.clone_from(&identity.host);

        let previous = std::fs::read_to_string(&self.path).ok();
        save_config_to(&config, &self.path)?;

        // The file is committed first so a keyring failure can be undone.
        if keyring_update {
            if let Err(e) = store_local_key(device_id, &identity.secret) {
                self.restore(previous.as_deref());
                return Err(e.into());
            }
        }

        debug!(door = device_id, path = %self.path.display(), "identity saved");
        Ok(())
    }
}
