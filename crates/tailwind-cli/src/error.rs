//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use tailwind_config::ConfigError;
use tailwind_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(
        code(tailwind::connection_failed),
        help(
            "Check that the controller is powered on and reachable on the local network.\n\
             Try: tailwind status --host <ip> -v"
        )
    )]
    ConnectionFailed { message: String },

    #[error("Could not listen on {addr}")]
    #[diagnostic(
        code(tailwind::listen_failed),
        help("Pick another address with --listen, or stop whatever holds the port.")
    )]
    ListenFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── Controller ───────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(
        code(tailwind::controller_rejected),
        help(
            "The controller refused the request. The Local Control Key is the usual cause.\n\
             Find it in the Tailwind app under Local Control, then run:\n\
             tailwind config set-key <door> <key>"
        )
    )]
    ControllerRejected { message: String },

    #[error("No local key configured for door '{door}'")]
    #[diagnostic(
        code(tailwind::no_local_key),
        help(
            "Set one with: tailwind config set-key {door} <key>\n\
             Or pass --local-key / TAILWIND_LOCAL_KEY."
        )
    )]
    NoLocalKey { door: String },

    #[error("No enabled doors found on this controller.")]
    #[diagnostic(code(tailwind::no_doors))]
    NoEnabledDoors,

    #[error("Client not initialized")]
    #[diagnostic(code(tailwind::uninitialized))]
    Uninitialized,

    // ── Configuration ────────────────────────────────────────────────

    #[error("Door '{door}' not found in configuration")]
    #[diagnostic(
        code(tailwind::door_not_found),
        help(
            "Available doors: {available}\n\
             Pair one with: tailwind pair --host <ip> --local-key <key> --save"
        )
    )]
    DoorNotFound { door: String, available: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tailwind::validation))]
    Validation { field: String, reason: String },

    #[error("{message}")]
    #[diagnostic(code(tailwind::store))]
    Store { message: String },

    #[error(transparent)]
    #[diagnostic(code(tailwind::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(tailwind::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Request failed: {0}")]
    #[diagnostic(code(tailwind::http))]
    Http(#[from] reqwest::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::ListenFailed { .. } | Self::Http(_) => {
                exit_code::CONNECTION
            }
            Self::ControllerRejected { .. } | Self::NoLocalKey { .. } => exit_code::AUTH,
            Self::DoorNotFound { .. } | Self::NoEnabledDoors => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Uninitialized
            | Self::Store { .. }
            | Self::Config(_)
            | Self::Io(_)
            | Self::Json(_) => exit_code::GENERAL,
        }
    }

    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Connectivity { message } => Self::ConnectionFailed { message },
            CoreError::Application { message } => Self::ControllerRejected { message },
            CoreError::Uninitialized => Self::Uninitialized,
            CoreError::NoEnabledDoors => Self::NoEnabledDoors,
            CoreError::Store { message } => Self::Store { message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoLocalKey { door } => Self::NoLocalKey { door },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}
