// ── Connection settings ──
//
// Host and shared-secret changes are validated locally, proven against
// the controller with a trial status fetch, and only then committed.
// A failure at any step leaves the stored identity and the live client
// exactly as they were.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::error::CoreError;
use crate::reconciler::StateReconciler;

pub const MAX_HOST_LEN: usize = 253;
pub const SECRET_LEN: usize = 6;

pub const INVALID_HOST: &str = "Invalid controller host";
pub const INVALID_SECRET: &str = "Invalid local key: must be exactly 6 digits";
pub const TRIAL_FAILED: &str = "Could not connect to controller with new settings";
pub const SETTINGS_SAVED: &str = "Settings saved. Connection verified.";

/// Fields the user changed. `None` keeps the committed value.
#[derive(Debug, Clone, Default)]
pub struct SettingsChange {
    pub controller_host: Option<String>,
    pub local_secret: Option<SecretString>,
}

impl SettingsChange {
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            controller_host: Some(host.into()),
            local_secret: None,
        }
    }

    pub fn secret(secret: impl Into<String>) -> Self {
        Self {
            controller_host: None,
            local_secret: Some(SecretString::from(secret.into())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.controller_host.is_none() && self.local_secret.is_none()
    }
}

/// Non-empty, at most 253 characters of `[A-Za-z0-9._-]`.
pub fn validate_host(host: &str) -> Result<(), CoreError> {
    let valid = !host.is_empty()
        && host.len() <= MAX_HOST_LEN
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(CoreError::validation(INVALID_HOST))
    }
}

/// Exactly six ASCII digits.
pub fn validate_secret(secret: &str) -> Result<(), CoreError> {
    if secret.len() == SECRET_LEN && secret.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(CoreError::validation(INVALID_SECRET))
    }
}

impl StateReconciler {
    /// Validate, trial, and commit a settings change.
    ///
    /// Returns the confirmation message on success. On any error nothing
    /// is persisted and the live client is untouched.
    pub async fn apply_settings(&self, change: SettingsChange) -> Result<&'static str, CoreError> {
        let _settings = self.inner.settings_lock.lock().await;

        if let Some(host) = &change.controller_host {
            validate_host(host)?;
        }
        if let Some(secret) = &change.local_secret {
            validate_secret(secret.expose_secret())?;
        }

        let live = self
            .inner
            .client
            .load_full()
            .ok_or(CoreError::Uninitialized)?;
        let candidate = match &change.local_secret {
            Some(secret) => Arc::new(self.inner.context.config.build_client(secret.clone())?),
            None => Arc::clone(&live),
        };

        let committed = self.identity().await;
        let trial_host = change
            .controller_host
            .clone()
            .unwrap_or_else(|| committed.host.clone());

        if let Err(e) = candidate.get_status(&trial_host).await {
            warn!(host = trial_host, error = %e, "settings trial failed");
            return Err(CoreError::connectivity(TRIAL_FAILED));
        }

        let mut state = self.inner.state.lock().await;
        if !self.is_current(self.generation()) {
            return Err(CoreError::Uninitialized);
        }

        let mut next = state.identity.clone();
        if let Some(host) = change.controller_host {
            next.host = host;
        }
        let secret_changed = change.local_secret.is_some();
        if let Some(secret) = change.local_secret {
            next.secret = secret;
        }

        self.inner
            .context
            .store
            .save_identity(&self.inner.device_id, &next)?;
        state.identity = next;
        if secret_changed {
            self.inner.client.store(Some(candidate));
        }

        let host = state.identity.host.clone();
        drop(state);

        info!(device = %self.inner.device_id, host, "settings committed");
        self.spawn_registration(host, "settings");
        Ok(SETTINGS_SAVED)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hostnames_and_addresses() {
        for host in ["tailwind-abc.local", "192.168.1.20", "ctrl_1", "a"] {
            assert!(validate_host(host).is_ok(), "{host}");
        }
    }

    #[test]
    fn rejects_bad_hosts() {
        let too_long = "a".repeat(MAX_HOST_LEN + 1);
        for host in ["", "bad host", "ctrl:80", "http://x", "ünïcode", too_long.as_str()] {
            let err = validate_host(host).unwrap_err();
            assert_eq!(err.to_string(), INVALID_HOST, "{host}");
        }
        assert!(validate_host(&"a".repeat(MAX_HOST_LEN)).is_ok());
    }

    #[test]
    fn secret_must_be_six_digits() {
        assert!(validate_secret("012345").is_ok());
        for secret in ["12345", "1234567", "12345a", "", "١٢٣٤٥٦"] {
            let err = validate_secret(secret).unwrap_err();
            assert!(matches!(err, CoreError::Validation { .. }));
            assert_eq!(err.to_string(), INVALID_SECRET);
        }
    }
}
