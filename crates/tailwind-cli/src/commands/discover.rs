//! `tailwind discover`: read a saved discovery cache and match it against
//! paired doors.

use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;

use tailwind_core::discovery::{self, DiscoveryResult};
use tailwind_core::ControllerIdentity;

use crate::cli::{DiscoverArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct DiscoveredView {
    name: String,
    host: String,
    discovery_id: String,
    /// Configured doors that this controller matches.
    paired: Vec<String>,
}

#[derive(Tabled)]
struct DiscoveredRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Discovery ID")]
    discovery_id: String,
    #[tabled(rename = "Paired Doors")]
    paired: String,
}

pub fn handle(args: &DiscoverArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let contents = std::fs::read_to_string(&args.from)?;
    let results: Vec<DiscoveryResult> = serde_json::from_str(&contents)?;
    let cfg = config::load(global)?;

    // Matching never needs the key.
    let paired: Vec<(&str, ControllerIdentity)> = cfg
        .doors
        .iter()
        .map(|(id, profile)| {
            let mut identity = ControllerIdentity::new(
                profile.controller_host.clone(),
                SecretString::from(String::new()),
            );
            identity.discovery_id.clone_from(&profile.discovery_id);
            (id.as_str(), identity)
        })
        .collect();

    let views: Vec<DiscoveredView> = discovery::controllers_from_results(&results)
        .into_iter()
        .map(|controller| {
            let probe = results.iter().find(|r| r.id == controller.discovery_id);
            let paired = probe
                .map(|probe| {
                    paired
                        .iter()
                        .filter(|(_, identity)| discovery::matches(identity, probe))
                        .map(|(id, _)| (*id).to_owned())
                        .collect()
                })
                .unwrap_or_default();
            DiscoveredView {
                name: controller.name,
                host: controller.host,
                discovery_id: controller.discovery_id,
                paired,
            }
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &views,
        |v| DiscoveredRow {
            name: v.name.clone(),
            host: v.host.clone(),
            discovery_id: v.discovery_id.clone(),
            paired: if v.paired.is_empty() {
                "-".into()
            } else {
                v.paired.join(", ")
            },
        },
        |v| v.host.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
