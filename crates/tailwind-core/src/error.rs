// ── Core error types ──
//
// User-facing errors from tailwind-core. Consumers never see HTTP status
// codes or JSON parse failures directly: the `From<tailwind_api::Error>`
// impl folds transport-layer errors into connectivity or application
// failures, and each variant displays as one descriptive message.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed host or shared secret, rejected before any network call.
    #[error("{message}")]
    Validation { message: String },

    /// Transport failure, non-2xx status, or exhausted retries.
    #[error("{message}")]
    Connectivity { message: String },

    /// The controller answered `result: "Fail"`.
    #[error("{message}")]
    Application { message: String },

    /// A command was issued before a client exists (or after teardown).
    #[error("Client not initialized")]
    Uninitialized,

    #[error("No enabled doors found on this controller.")]
    NoEnabledDoors,

    /// The committed-identity store rejected a write.
    #[error("Failed to persist settings: {message}")]
    Store { message: String },
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tailwind_api::Error> for CoreError {
    fn from(err: tailwind_api::Error) -> Self {
        match err {
            tailwind_api::Error::Application { message } => CoreError::Application { message },
            tailwind_api::Error::InvalidSecret => {
                CoreError::validation("Invalid local key: not a valid header value")
            }
            tailwind_api::Error::InvalidUrl(e) => {
                CoreError::validation(format!("Invalid controller host: {e}"))
            }
            other @ (tailwind_api::Error::Transport(_)
            | tailwind_api::Error::Http { .. }
            | tailwind_api::Error::Tls(_)
            | tailwind_api::Error::Deserialization { .. }) => CoreError::Connectivity {
                message: other.to_string(),
            },
        }
    }
}
