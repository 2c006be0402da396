// tailwind-api: Async Rust client for the Tailwind iQ3 local control API

pub mod client;
pub mod error;
pub mod models;
pub mod retry;
pub mod transport;

pub use client::CommandClient;
pub use error::Error;
pub use models::{
    Command, CommandResponse, DoorAction, DoorMap, DoorPosition, DoorStatus, NotificationPayload,
    Notify, NotifyEvent, ResultCode, StatusResponse,
};
pub use retry::RetryPolicy;
pub use transport::TransportConfig;
