#![allow(clippy::unwrap_used)]
// Config loading, migration of legacy keys, and the file-backed store.

use std::time::Duration;

use figment::Jail;
use secrecy::{ExposeSecret, SecretString};
use tempfile::TempDir;

use tailwind_config::{
    Config, ConfigError, DoorProfile, FileIdentityStore, load_config_file, load_config_from,
    save_config_to,
};
use tailwind_core::{ControllerIdentity, IdentityStore};

fn write(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_config_from(&dir.path().join("absent.toml")).unwrap();

    assert!(config.doors.is_empty());
    assert_eq!(config.defaults.timeout, 10);
    assert_eq!(config.defaults.poll_interval, 30);
    assert_eq!(config.defaults.callback_base, "http://127.0.0.1:8787");
    assert_eq!(config.defaults.listen, "0.0.0.0:8787");
}

#[test]
fn loads_doors_and_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        r#"
default_door = "garage"

[defaults]
poll_interval = 15
callback_base = "http://192.168.1.50:8787"

[doors.garage]
controller_host = "tailwind-abc.local"
local_key = "123456"
door_index = 1
discovery_id = "TW-WebServer"
name = "Garage Door 2"
"#,
    );

    let config = load_config_from(&path).unwrap();
    let (id, door) = config.door(None).unwrap();
    assert_eq!(id, "garage");
    assert_eq!(door.controller_host, "tailwind-abc.local");
    assert_eq!(door.door_index, 1);
    assert_eq!(door.discovery_id.as_deref(), Some("TW-WebServer"));

    let runtime = config.defaults.reconciler_config().unwrap();
    assert_eq!(runtime.poll_interval, Duration::from_secs(15));
    assert_eq!(
        runtime.callback_url("tailwind-abc.local").unwrap().as_str(),
        "http://192.168.1.50:8787/api/notification?host=tailwind-abc.local"
    );
}

#[test]
fn legacy_host_keys_are_migrated() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        r#"
[doors.by_name]
controller_hostname = "tailwind-abc.local"
local_key = "123456"

[doors.by_ip]
controller_ip = "192.168.1.20"
local_key = "123456"
"#,
    );

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.doors["by_name"].controller_host, "tailwind-abc.local");
    assert_eq!(config.doors["by_ip"].controller_host, "192.168.1.20");

    // Saving writes the current key name only.
    save_config_to(&config, &path).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("controller_host"));
    assert!(!written.contains("controller_ip"));
}

#[test]
fn door_lookup_errors() {
    let mut config = Config::default();
    assert!(matches!(config.door(None), Err(ConfigError::UnknownDoor { .. })));

    config.doors.insert("a".into(), DoorProfile::default());
    config.doors.insert("b".into(), DoorProfile::default());
    assert!(matches!(config.door(None), Err(ConfigError::UnknownDoor { .. })));
    assert!(matches!(config.door(Some("c")), Err(ConfigError::UnknownDoor { .. })));
    assert_eq!(config.door(Some("b")).unwrap().0, "b");
}

#[test]
fn invalid_callback_base_is_rejected() {
    let mut config = Config::default();
    config.defaults.callback_base = "not a url".into();
    let err = config.defaults.reconciler_config().unwrap_err();
    assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "callback_base"));
}

#[test]
fn proxy_is_passed_to_the_transport() {
    let mut config = Config::default();
    assert!(config.defaults.reconciler_config().unwrap().transport.proxy.is_none());

    config.defaults.proxy = Some("http://10.0.0.2:3128".into());
    let runtime = config.defaults.reconciler_config().unwrap();
    assert_eq!(
        runtime.transport.proxy.map(|u| u.to_string()).as_deref(),
        Some("http://10.0.0.2:3128/")
    );

    config.defaults.proxy = Some("not a url".into());
    let err = config.defaults.reconciler_config().unwrap_err();
    assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "proxy"));
}

#[test]
fn file_store_round_trips_plaintext_identity() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        r#"
[doors.garage]
controller_host = "tailwind-abc.local"
local_key = "123456"

[doors.shed]
controller_host = "tailwind-def.local"
local_key = "111111"
door_index = 2
"#,
    );
    let store = FileIdentityStore::new(&path);

    let loaded = store.load_identity("garage").unwrap().unwrap();
    assert_eq!(loaded.host, "tailwind-abc.local");
    assert_eq!(loaded.secret.expose_secret(), "123456");
    assert!(store.load_identity("attic").unwrap().is_none());

    let updated =
        ControllerIdentity::new("192.168.1.21", SecretString::from("654321".to_string()));
    store.save_identity("garage", &updated).unwrap();

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.doors["garage"].controller_host, "192.168.1.21");
    assert_eq!(config.doors["garage"].local_key.as_deref(), Some("654321"));
    // Other doors are untouched.
    assert_eq!(config.doors["shed"].controller_host, "tailwind-def.local");
    assert_eq!(config.doors["shed"].door_index, 2);
}

#[test]
fn file_store_rejects_unknown_door() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "");
    let store = FileIdentityStore::new(&path);

    let identity =
        ControllerIdentity::new("tailwind-abc.local", SecretString::from("123456".to_string()));
    assert!(store.save_identity("ghost", &identity).is_err());
}

#[test]
fn file_store_does_not_persist_env_overrides() {
    Jail::expect_with(|jail| {
        let path = jail.directory().join("config.toml");
        jail.create_file(
            "config.toml",
            r#"
[doors.garage]
controller_host = "tailwind-abc.local"
local_key = "123456"
"#,
        )?;
        // `output` is not asserted elsewhere, so parallel tests are unaffected.
        jail.set_env("TAILWIND_DEFAULTS__OUTPUT", "yaml");
        assert_eq!(load_config_from(&path).unwrap().defaults.output, "yaml");

        let store = FileIdentityStore::new(&path);
        let updated =
            ControllerIdentity::new("192.168.1.21", SecretString::from("123456".to_string()));
        store.save_identity("garage", &updated).unwrap();

        let written = load_config_file(&path).unwrap();
        assert_eq!(written.doors["garage"].controller_host, "192.168.1.21");
        assert_eq!(written.defaults.output, "table");
        Ok(())
    });
}
