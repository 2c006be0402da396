mod cli;
mod commands;
mod config;
mod error;
mod ingress;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Local-only commands: no controller needed
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),
        Command::Discover(args) => commands::discover::handle(&args, &cli.global),
        Command::Notify(args) => commands::notify::handle(args, &cli.global).await,
        Command::Notifications(args) => commands::notify::show_log(&args, &cli.global).await,

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "tailwind", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            tracing::debug!(command = cmd.name(), "dispatching command");
            commands::dispatch(cmd, &cli.global).await
        }
    }
}
