use thiserror::Error;

/// Top-level error type for the `tailwind-api` crate.
///
/// Every failure the controller's local control API can produce lands here:
/// transport, HTTP status, the `result: "Fail"` envelope, and body decoding.
/// `tailwind-core` folds these into its connectivity/application taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The controller answered with a non-2xx status. The body is not inspected.
    #[error("HTTP error! status: {status}")]
    Http { status: u16 },

    /// URL parsing error (malformed host).
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Building the underlying `reqwest::Client` failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The shared secret cannot be sent as an HTTP header value.
    #[error("Invalid shared secret: not a valid header value")]
    InvalidSecret,

    // ── Application ─────────────────────────────────────────────────
    /// The controller responded `{"result": "Fail"}`. Carries `info`, or a
    /// generic message when the controller gave none.
    #[error("{message}")]
    Application { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the controller itself rejected the command.
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application { .. })
    }

    /// Returns `true` if this is a network-level failure (no usable response).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status } => *status >= 500,
            _ => false,
        }
    }

    /// The HTTP status code, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
