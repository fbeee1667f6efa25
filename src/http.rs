//! HTTP edge: event ingress, command surface, health and metrics.
//!
//! The platform adapter (out of scope here) authenticates its users, then
//! forwards membership events and commands as JSON. Events are acknowledged
//! as soon as they are queued; commands wait for the guild worker's reply.

use crate::controller::VoiceEvent;
use crate::controller::commands::CommandEnvelope;
use crate::dispatch::Dispatcher;
use crate::error::CommandError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

/// Build the edge router.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/v1/events/voice", post(voice_event))
        .route("/v1/commands", post(command))
        .with_state(AppState { dispatcher })
}

/// Bind and serve until the process exits.
pub async fn serve(port: u16, dispatcher: Arc<Dispatcher>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP edge listening");
    axum::serve(listener, router(dispatcher)).await
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn voice_event(State(state): State<AppState>, Json(event): Json<VoiceEvent>) -> StatusCode {
    state.dispatcher.submit_voice(event).await;
    StatusCode::ACCEPTED
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    ok: bool,
    message: String,
}

async fn command(
    State(state): State<AppState>,
    Json(envelope): Json<CommandEnvelope>,
) -> (StatusCode, Json<CommandResponse>) {
    match state.dispatcher.command(envelope).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(CommandResponse {
                ok: true,
                message: reply.message,
            }),
        ),
        Err(e) => (
            status_for(&e),
            Json(CommandResponse {
                ok: false,
                message: e.user_message(),
            }),
        ),
    }
}

fn status_for(error: &CommandError) -> StatusCode {
    match error {
        CommandError::Validation(_) => StatusCode::BAD_REQUEST,
        CommandError::NotInRoom | CommandError::NotOwner | CommandError::MissingPrivileges => {
            StatusCode::FORBIDDEN
        }
        CommandError::Remote(_) => StatusCode::BAD_GATEWAY,
        CommandError::Db(_) | CommandError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;

    #[test]
    fn status_mapping_follows_the_taxonomy() {
        assert_eq!(
            status_for(&CommandError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&CommandError::NotOwner), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&CommandError::NotInRoom), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&CommandError::Remote(RemoteError::RateLimited)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&CommandError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
