// ── Discovery matching ──
//
// The host owns an mDNS cache; this module only reads its results. A probe
// identifies a paired controller by its discovery id, or failing that by
// hostname in canonical `name.local` form.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::identity::ControllerIdentity;

/// One entry from the host's discovery cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub txt: HashMap<String, String>,
}

/// A controller offered to the user during pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredController {
    pub name: String,
    pub host: String,
    pub discovery_id: String,
}

/// `tailwind-abc`, `tailwind-abc.local`, and `tailwind-abc.local.` all
/// become `tailwind-abc.local`.
pub fn normalize_local_hostname(name: &str) -> String {
    let base = name
        .strip_suffix(".local.")
        .or_else(|| name.strip_suffix(".local"))
        .unwrap_or(name);
    format!("{base}.local")
}

/// Does `probe` describe the controller behind `identity`?
///
/// Two controllers that advertise the same generic hostname are
/// indistinguishable here unless a discovery id was recorded at pairing.
pub fn matches(identity: &ControllerIdentity, probe: &DiscoveryResult) -> bool {
    if identity
        .discovery_id
        .as_deref()
        .is_some_and(|id| id == probe.id)
    {
        return true;
    }

    match probe.host.as_deref() {
        Some(probe_host) if !identity.host.is_empty() => {
            normalize_local_hostname(probe_host) == normalize_local_hostname(&identity.host)
        }
        _ => false,
    }
}

/// Pairing list from discovery results: prefer the `.local` name, fall back
/// to the address, skip entries with neither.
pub fn controllers_from_results<'a>(
    results: impl IntoIterator<Item = &'a DiscoveryResult>,
) -> Vec<DiscoveredController> {
    results
        .into_iter()
        .filter_map(|result| {
            let hostname = result.host.as_deref().filter(|h| !h.is_empty());
            let address = result.address.as_deref().filter(|a| !a.is_empty());

            let (name, host) = match (hostname, address) {
                (Some(hostname), _) => {
                    let host = normalize_local_hostname(hostname);
                    let name = host.strip_suffix(".local").unwrap_or(&host).to_owned();
                    (name, host)
                }
                (None, Some(address)) => (address.to_owned(), address.to_owned()),
                (None, None) => return None,
            };

            debug!(
                name,
                host,
                id = result.id,
                product = result.txt.get("product").map_or("", String::as_str),
                "discovered controller"
            );
            Some(DiscoveredController {
                name,
                host,
                discovery_id: result.id.clone(),
            })
        })
        .collect()
}
