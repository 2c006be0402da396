// Shared transport configuration for building reqwest::Client instances.
//
// The controller speaks plaintext HTTP on the local network, so the only
// knobs are the request timeout, an optional forwarding proxy for
// controllers on another segment, and the default headers every command
// carries (`TOKEN` plus `Content-Type`).

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

/// Name of the header carrying the local control key (`TOKEN`; header
/// names are case-insensitive and `http` stores them lowercased).
pub const TOKEN_HEADER: &str = "token";

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    /// Send every command through this HTTP proxy.
    pub proxy: Option<Url>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            proxy: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` that authenticates every request with the
    /// given shared secret.
    pub fn build_client(&self, secret: &SecretString) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("tailwind-local/", env!("CARGO_PKG_VERSION")))
            .default_headers(auth_headers(secret)?);

        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::http(proxy.as_str())
                .map_err(|e| Error::Tls(format!("invalid proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// Headers sent with every command: `TOKEN` and `Content-Type: application/json`.
pub fn auth_headers(secret: &SecretString) -> Result<HeaderMap, Error> {
    let mut token =
        HeaderValue::from_str(secret.expose_secret()).map_err(|_| Error::InvalidSecret)?;
    token.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(TOKEN_HEADER), token);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}
