// Runtime settings shared by every reconciler in a process.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use tailwind_api::{CommandClient, RetryPolicy, TransportConfig};

use crate::error::CoreError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_CALLBACK_BASE: &str = "http://127.0.0.1:8787";

/// Path the ingress serves push notifications on.
pub const NOTIFICATION_PATH: [&str; 2] = ["api", "notification"];

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub poll_interval: Duration,
    pub transport: TransportConfig,
    pub retry: RetryPolicy,
    /// Base URL the controller should POST pushes to.
    pub callback_base: Url,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            transport: TransportConfig::default(),
            retry: RetryPolicy::default(),
            callback_base: Url::parse(DEFAULT_CALLBACK_BASE)
                .expect("default callback base is a valid URL"),
        }
    }
}

impl ReconcilerConfig {
    pub fn build_client(&self, secret: SecretString) -> Result<CommandClient, CoreError> {
        Ok(CommandClient::new(secret, &self.transport)?.with_retry(self.retry))
    }

    /// `{callback_base}/api/notification?host={host}`
    pub fn callback_url(&self, host: &str) -> Result<Url, CoreError> {
        let mut url = self.callback_base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                CoreError::validation(format!(
                    "Callback base cannot carry a path: {}",
                    self.callback_base
                ))
            })?
            .pop_if_empty()
            .extend(NOTIFICATION_PATH);
        url.set_fragment(None);
        url.query_pairs_mut().clear().append_pair("host", host);
        Ok(url)
    }
}
