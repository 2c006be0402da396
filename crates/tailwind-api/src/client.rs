// Local control API HTTP client
//
// Wraps `reqwest::Client` with the controller's command envelope, the
// `result: "Fail"` check, and bounded retry. One client is bound to one
// shared secret; the host is passed per call because settings changes can
// move a door to a different address without re-keying.

use std::sync::Arc;

use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::models::{
    Command, CommandResponse, DoorAction, ResultCode, ResultEnvelope, StatusResponse,
};
use crate::retry::RetryPolicy;
use crate::transport::TransportConfig;

/// Fallback message when the controller fails a command without `info`.
const UNKNOWN_API_ERROR: &str = "Unknown API error";

/// Raw HTTP client for the controller's `/json` endpoint.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct CommandClient {
    http: reqwest::Client,
    retry: RetryPolicy,
    secret: Arc<SecretString>,
}

impl CommandClient {
    /// Create a client that authenticates with `secret`.
    pub fn new(secret: SecretString, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client(&secret)?;
        Ok(Self {
            http,
            retry: RetryPolicy::default(),
            secret: Arc::new(secret),
        })
    }

    /// Replace the retry schedule.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The shared secret this client presents.
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Fetch controller and door status (`dev_st`).
    pub async fn get_status(&self, host: &str) -> Result<StatusResponse, Error> {
        debug!(host, "fetching device status");
        self.send(host, &Command::device_status()).await
    }

    /// Open or close a door (`door_op`).
    pub async fn control_door(
        &self,
        host: &str,
        door_index: u8,
        action: DoorAction,
    ) -> Result<CommandResponse, Error> {
        debug!(host, door_index, action = action.as_str(), "sending door command");
        self.send(host, &Command::door_operation(door_index, action))
            .await
    }

    /// Point the controller's push notifications at `url` (`notify_url`).
    pub async fn register_callback(&self, host: &str, url: &str) -> Result<CommandResponse, Error> {
        debug!(host, url, "registering notify url");
        self.send(host, &Command::register_notify_url(url)).await
    }

    /// Turn the controller's push notifications off.
    pub async fn unregister_callback(&self, host: &str) -> Result<CommandResponse, Error> {
        debug!(host, "unregistering notify url");
        self.send(host, &Command::unregister_notify_url()).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a command, retrying per the policy.
    ///
    /// Every failure (unusable host, transport, HTTP status, `Fail`,
    /// undecodable body) is retried. When attempts run out, the last error
    /// is returned as-is.
    pub async fn send<T: DeserializeOwned>(&self, host: &str, command: &Command) -> Result<T, Error> {
        let mut attempt: u32 = 0;

        loop {
            match self.send_once(host, command).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let Some(delay) = self.retry.delay_after(attempt) else {
                        warn!(host, attempt, error = %e, "command failed, giving up");
                        return Err(e);
                    };
                    warn!(
                        host,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        transient = e.is_transient(),
                        error = %e,
                        "command failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// A single POST and response classification.
    async fn send_once<T: DeserializeOwned>(&self, host: &str, command: &Command) -> Result<T, Error> {
        let url = endpoint(host)?;
        debug!(name = command.data.name, "POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(command)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        parse_response(&body)
    }
}

/// `http://{host}/json`
pub fn endpoint(host: &str) -> Result<Url, Error> {
    Ok(Url::parse(&format!("http://{host}/json"))?)
}

/// Check the `result` field, then decode the full payload.
fn parse_response<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    let envelope: ResultEnvelope = serde_json::from_str(body).map_err(|e| deser_error(&e, body))?;

    if envelope.result == Some(ResultCode::Fail) {
        return Err(Error::Application {
            message: envelope
                .info
                .filter(|info| !info.is_empty())
                .unwrap_or_else(|| UNKNOWN_API_ERROR.into()),
        });
    }

    serde_json::from_str(body).map_err(|e| deser_error(&e, body))
}

fn deser_error(err: &serde_json::Error, body: &str) -> Error {
    let preview: String = body.chars().take(200).collect();
    Error::Deserialization {
        message: format!("{err} (body preview: {preview:?})"),
        body: body.to_owned(),
    }
}
