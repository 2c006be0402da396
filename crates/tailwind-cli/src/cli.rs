//! Clap derive structures for the `tailwind` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use tailwind_api::{DoorPosition, NotifyEvent};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tailwind -- local control for Tailwind iQ3 garage door controllers
#[derive(Debug, Parser)]
#[command(
    name = "tailwind",
    version,
    about = "Control Tailwind iQ3 garage doors over the local network",
    long_about = "Talks to Tailwind iQ3 controllers through their local control API.\n\n\
        One-shot commands query or operate a door; `watch` keeps a live view\n\
        of every paired door from polling and controller push notifications.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Paired door to use
    #[arg(long, short = 'd', env = "TAILWIND_DOOR", global = true)]
    pub door: Option<String>,

    /// Controller hostname or IP (overrides the door's configured host)
    #[arg(long, short = 'H', env = "TAILWIND_HOST", global = true)]
    pub host: Option<String>,

    /// Local Control Key
    #[arg(long, env = "TAILWIND_LOCAL_KEY", global = true, hide_env_values = true)]
    pub local_key: Option<String>,

    /// Zero-based door index on the controller
    #[arg(long, global = true)]
    pub door_index: Option<u8>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "TAILWIND_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TAILWIND_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides the config file)
    #[arg(long, env = "TAILWIND_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show controller and door status
    #[command(alias = "st")]
    Status,

    /// Open the door
    Open,

    /// Close the door
    Close,

    /// Authenticate against a controller and list its doors
    Pair(PairArgs),

    /// List controllers from a saved discovery cache
    Discover(DiscoverArgs),

    /// Follow door state live (poll + push notifications)
    Watch(WatchArgs),

    /// Point the controller's push notifications at this host
    Register(RegisterArgs),

    /// Stop the controller's push notifications
    Unregister,

    /// Change a paired door's host or local key (verified before saving)
    Settings(SettingsArgs),

    /// Send a synthetic push notification to a running `watch`
    Notify(NotifyArgs),

    /// Show the recent push notifications received by a running `watch`
    Notifications(NotificationsArgs),

    /// Manage CLI configuration and paired doors
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

impl Command {
    /// Subcommand name for logging. Arguments may carry keys.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Open => "open",
            Self::Close => "close",
            Self::Pair(_) => "pair",
            Self::Discover(_) => "discover",
            Self::Watch(_) => "watch",
            Self::Register(_) => "register",
            Self::Unregister => "unregister",
            Self::Settings(_) => "settings",
            Self::Notify(_) => "notify",
            Self::Notifications(_) => "notifications",
            Self::Config(_) => "config",
            Self::Completions(_) => "completions",
        }
    }
}

// ── Pairing & Discovery ──────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PairArgs {
    /// Discovery id to record, so the door can be matched by mDNS later
    #[arg(long)]
    pub discovery_id: Option<String>,

    /// Save every enabled door to the config file
    #[arg(long)]
    pub save: bool,

    /// Store the local key in the system keyring instead of the config file
    #[arg(long, requires = "save")]
    pub keyring: bool,
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// JSON array of discovery results (`id`, `address`, `host`, `txt`)
    #[arg(long, value_name = "FILE")]
    pub from: PathBuf,
}

// ── Live view ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Doors to watch (default: every configured door)
    pub doors: Vec<String>,

    /// Bind address for the push notification listener
    #[arg(long, env = "TAILWIND_LISTEN")]
    pub listen: Option<String>,

    /// URL controllers should POST notifications to
    #[arg(long, env = "TAILWIND_CALLBACK_BASE")]
    pub callback_base: Option<String>,

    /// Poll interval in seconds
    #[arg(long)]
    pub poll_interval: Option<u64>,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// URL controllers should POST notifications to
    #[arg(long, env = "TAILWIND_CALLBACK_BASE")]
    pub callback_base: Option<String>,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// New controller hostname or IP
    #[arg(long = "set-host", value_name = "HOST")]
    pub new_host: Option<String>,

    /// New local key (6 digits)
    #[arg(long = "set-key", value_name = "KEY")]
    pub new_key: Option<String>,
}

// ── Test notifications ───────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NotifyArgs {
    /// Event to simulate
    #[arg(value_enum)]
    pub event: EventArg,

    /// Base URL of the running listener
    #[arg(long, env = "TAILWIND_NOTIFY_URL", default_value = "http://127.0.0.1:8787")]
    pub url: String,

    /// Controller host the push claims to come from (`host` query parameter)
    #[arg(long, default_value = "")]
    pub source: String,

    /// Zero-based door index the event refers to
    #[arg(long, default_value = "0")]
    pub door_idx: u8,

    /// Device id reported in the payload
    #[arg(long, default_value = "test_controller")]
    pub dev_id: String,

    /// Position reported for the door (default: follows the event)
    #[arg(long, value_enum)]
    pub status: Option<PositionArg>,
}

#[derive(Debug, Args)]
pub struct NotificationsArgs {
    /// Base URL of the running listener
    #[arg(long, env = "TAILWIND_NOTIFY_URL", default_value = "http://127.0.0.1:8787")]
    pub url: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EventArg {
    Open,
    Close,
    Lock,
    Enable,
    Disable,
    Reboot,
}

impl From<EventArg> for NotifyEvent {
    fn from(event: EventArg) -> Self {
        match event {
            EventArg::Open => Self::Open,
            EventArg::Close => Self::Close,
            EventArg::Lock => Self::Lock,
            EventArg::Enable => Self::Enable,
            EventArg::Disable => Self::Disable,
            EventArg::Reboot => Self::Reboot,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PositionArg {
    Open,
    Close,
}

impl From<PositionArg> for DoorPosition {
    fn from(position: PositionArg) -> Self {
        match position {
            PositionArg::Open => Self::Open,
            PositionArg::Close => Self::Close,
        }
    }
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved configuration (keys redacted)
    Show,

    /// Print the config file path
    Path,

    /// Set a door's local key
    SetKey {
        /// Door id
        #[arg(value_name = "DOOR")]
        door_id: String,

        /// Local key (6 digits)
        key: String,

        /// Store in the system keyring instead of the config file
        #[arg(long)]
        keyring: bool,
    },

    /// Set the door used when none is named
    SetDefault {
        /// Door id
        #[arg(value_name = "DOOR")]
        door_id: String,
    },

    /// Remove a paired door
    Remove {
        /// Door id
        #[arg(value_name = "DOOR")]
        door_id: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
