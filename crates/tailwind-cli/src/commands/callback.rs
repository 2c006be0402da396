//! `tailwind register` / `tailwind unregister`: manage the controller's
//! push notification target.

use serde::Serialize;

use tailwind_config::Config;
use tailwind_core::{CoreError, ReconcilerConfig};

use crate::cli::{GlobalOpts, RegisterArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct CallbackView {
    host: String,
    /// `None` once unregistered.
    url: Option<String>,
}

pub fn apply_callback_base(runtime: &mut ReconcilerConfig, base: Option<&str>) -> Result<(), CliError> {
    if let Some(base) = base {
        runtime.callback_base = base
            .parse()
            .map_err(|_| CliError::validation("callback_base", format!("invalid URL: {base}")))?;
    }
    Ok(())
}

pub async fn register(
    args: &RegisterArgs,
    cfg: &Config,
    mut runtime: ReconcilerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    apply_callback_base(&mut runtime, args.callback_base.as_deref())?;
    let door = config::resolve_door(global, cfg)?;
    let host = door.identity.host;
    let url = runtime.callback_url(&host)?;

    runtime
        .build_client(door.identity.secret)?
        .register_callback(&host, url.as_str())
        .await
        .map_err(CoreError::from)?;

    render(
        global,
        &CallbackView {
            host,
            url: Some(url.into()),
        },
    );
    Ok(())
}

pub async fn unregister(
    cfg: &Config,
    runtime: &ReconcilerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let door = config::resolve_door(global, cfg)?;
    let host = door.identity.host;

    runtime
        .build_client(door.identity.secret)?
        .unregister_callback(&host)
        .await
        .map_err(CoreError::from)?;

    render(global, &CallbackView { host, url: None });
    Ok(())
}

fn render(global: &GlobalOpts, view: &CallbackView) {
    let out = output::render_single(
        &global.output,
        view,
        |v| match v.url {
            Some(ref url) => format!("{}: notifications -> {url}", v.host),
            None => format!("{}: notifications disabled", v.host),
        },
        |v| v.url.clone().unwrap_or_default(),
    );
    output::print_output(&out, global.quiet);
}
