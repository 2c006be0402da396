//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod callback;
pub mod config_cmd;
pub mod discover;
pub mod door;
pub mod notify;
pub mod pair;
pub mod settings;
pub mod status;
pub mod watch;

use tailwind_api::DoorAction;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a controller-bound command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let runtime = config::reconciler_config(global, &cfg)?;

    match cmd {
        Command::Status => status::handle(&cfg, &runtime, global).await,
        Command::Open => door::handle(DoorAction::Open, &cfg, &runtime, global).await,
        Command::Close => door::handle(DoorAction::Close, &cfg, &runtime, global).await,
        Command::Pair(args) => pair::handle(args, &runtime, global).await,
        Command::Watch(args) => watch::handle(args, &cfg, runtime, global).await,
        Command::Register(args) => callback::register(&args, &cfg, runtime, global).await,
        Command::Unregister => callback::unregister(&cfg, &runtime, global).await,
        Command::Settings(args) => settings::handle(args, &cfg, runtime, global).await,
        // Handled before dispatch
        Command::Config(_)
        | Command::Discover(_)
        | Command::Notify(_)
        | Command::Notifications(_)
        | Command::Completions(_) => Ok(()),
    }
}
