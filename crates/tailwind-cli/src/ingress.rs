//! HTTP listener for controller push notifications.
//!
//! `POST /api/notification?host=<controller>` publishes into the shared
//! [`NotificationRouter`]; `GET /api/notifications` returns the recent log.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tailwind_core::{NotificationPayload, NotificationRouter};

use crate::error::CliError;

pub const INVALID_PAYLOAD: &str = "Invalid notification payload";

#[derive(Debug, Deserialize)]
struct NotificationQuery {
    host: Option<String>,
}

pub fn router(notifications: Arc<NotificationRouter>) -> Router {
    Router::new()
        .route("/api/notification", post(receive_notification))
        .route("/api/notifications", get(notification_log))
        .with_state(notifications)
}

async fn receive_notification(
    State(notifications): State<Arc<NotificationRouter>>,
    Query(query): Query<NotificationQuery>,
    body: Bytes,
) -> Response {
    let payload: NotificationPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "unparseable notification body");
            return (StatusCode::BAD_REQUEST, INVALID_PAYLOAD).into_response();
        }
    };
    if payload.status.result.is_none() {
        warn!("notification without a result field");
        return (StatusCode::BAD_REQUEST, INVALID_PAYLOAD).into_response();
    }

    let source_host = query.host.filter(|h| !h.is_empty());
    debug!(
        source = source_host.as_deref().unwrap_or("-"),
        dev_id = payload.status.dev_id.as_deref().unwrap_or("-"),
        "notification received"
    );
    notifications.publish(payload, source_host);
    Json(true).into_response()
}

async fn notification_log(State(notifications): State<Arc<NotificationRouter>>) -> impl IntoResponse {
    Json(notifications.notification_log())
}

pub async fn bind(addr: &str) -> Result<TcpListener, CliError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| CliError::ListenFailed {
            addr: addr.to_owned(),
            source,
        })
}

/// Serve until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "notification listener started");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
