//! `GET /ws?token=<jwt>`: the live notification channel.
//!
//! After the token is verified the socket joins the user's channel in the
//! [`LiveChannelRegistry`](crate::services::live::LiveChannelRegistry). Events
//! pushed to the user are forwarded as JSON text frames; inbound frames are
//! only watched for the close.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::db::User;
use crate::error::{AppError, AppResult};
use crate::routes::auth::bearer_token;
use crate::services::auth::AuthService;
use crate::services::live::LiveEvent;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(connect))
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// Browsers cannot set headers on a WebSocket handshake, so the token comes
/// from the query string; a bearer header is accepted as well.
async fn connect(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> AppResult<Response> {
    let header_token = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);

    let token = query
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or(header_token)
        .ok_or_else(|| {
            tracing::debug!("Live connection attempt without a token");
            AppError::Unauthorized
        })?;

    let user = AuthService::get_user_from_token(&state, token).await?;

    let ws = ws.ok_or_else(|| AppError::BadRequest("Expected a WebSocket upgrade".to_string()))?;

    Ok(ws
        .on_upgrade(move |socket| run_session(socket, state, user))
        .into_response())
}

async fn run_session(socket: WebSocket, state: Arc<AppState>, user: User) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<LiveEvent>();

    let connection_id = state.live.register_connection(&user.id, tx);
    tracing::info!("User {} joined the live channel ({})", user.id, connection_id);

    let mut forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Failed to encode live event {}: {}", event.event, e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        // Registry dropped the sender (shutdown) or the socket is gone.
        let _ = sink.close().await;
    });

    let mut receive = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut forward => receive.abort(),
        _ = &mut receive => forward.abort(),
    }

    state.live.remove_connection(&user.id, connection_id);
    tracing::info!("User {} left the live channel ({})", user.id, connection_id);
}
