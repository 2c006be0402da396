// tailwind-core: door reconciliation and lifecycle for Tailwind controllers
//
// Sits between tailwind-api (raw HTTP) and a host process. Each paired door
// gets a `StateReconciler` that merges polled status and pushed
// notifications into one debounced view, fires edge triggers, and applies
// connection settings atomically.

pub mod config;
pub mod discovery;
pub mod door;
pub mod error;
pub mod identity;
pub mod pairing;
pub mod reconciler;
pub mod router;
pub mod settings;

pub use config::ReconcilerConfig;
pub use discovery::{DiscoveredController, DiscoveryResult};
pub use door::{Availability, DoorSnapshot, DoorState, DoorTrigger};
pub use error::CoreError;
pub use identity::{ControllerIdentity, IdentityStore, MemoryStore};
pub use pairing::PairableDoor;
pub use reconciler::{ReconcilerContext, StateReconciler};
pub use router::{InboundNotification, NotificationLogEntry, NotificationRouter, Subscription};
pub use settings::SettingsChange;

// Re-export the wire types hosts handle directly.
pub use tailwind_api::{CommandClient, NotificationPayload, RetryPolicy, TransportConfig};
