// ── Controller identity and its committed store ──

use dashmap::DashMap;
use secrecy::SecretString;

use crate::error::CoreError;

/// How to reach and authenticate with one physical controller.
///
/// `host` and `secret` change only through
/// [`StateReconciler::apply_settings`](crate::StateReconciler::apply_settings);
/// `discovery_id` is fixed at pairing time.
#[derive(Debug, Clone)]
pub struct ControllerIdentity {
    /// Hostname or IP, optionally with a port (`tailwind-abc.local`).
    pub host: String,
    /// The 6-digit local control key, sent as the `TOKEN` header.
    pub secret: SecretString,
    /// Identifier from the discovery cache, when the door was paired from it.
    pub discovery_id: Option<String>,
}

impl ControllerIdentity {
    pub fn new(host: impl Into<String>, secret: SecretString) -> Self {
        Self {
            host: host.into(),
            secret,
            discovery_id: None,
        }
    }

    pub fn with_discovery_id(mut self, id: impl Into<String>) -> Self {
        self.discovery_id = Some(id.into());
        self
    }
}

/// Key-value store holding the committed identity of each paired door.
///
/// Read by the host at startup; written only by a successful settings
/// apply. Implementations must make `save_identity` all-or-nothing.
pub trait IdentityStore: Send + Sync {
    fn load_identity(&self, device_id: &str) -> Result<Option<ControllerIdentity>, CoreError>;

    fn save_identity(&self, device_id: &str, identity: &ControllerIdentity)
    -> Result<(), CoreError>;
}

/// In-process [`IdentityStore`], for hosts that persist elsewhere and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    identities: DashMap<String, ControllerIdentity>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryStore {
    fn load_identity(&self, device_id: &str) -> Result<Option<ControllerIdentity>, CoreError> {
        Ok(self.identities.get(device_id).map(|entry| entry.clone()))
    }

    fn save_identity(
        &self,
        device_id: &str,
        identity: &ControllerIdentity,
    ) -> Result<(), CoreError> {
        self.identities
            .insert(device_id.to_owned(), identity.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn memory_store_round_trips_identity() {
        let store = MemoryStore::new();
        assert!(store.load_identity("door").unwrap().is_none());

        let identity = ControllerIdentity::new("tailwind-abc.local", "123456".to_string().into())
            .with_discovery_id("abc");
        store.save_identity("door", &identity).unwrap();

        let loaded = store.load_identity("door").unwrap().unwrap();
        assert_eq!(loaded.host, "tailwind-abc.local");
        assert_eq!(loaded.secret.expose_secret(), "123456");
        assert_eq!(loaded.discovery_id.as_deref(), Some("abc"));
    }
}
