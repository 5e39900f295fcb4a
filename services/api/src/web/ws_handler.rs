//! services/api/src/web/ws_handler.rs
//!
//! This is the entry point and control loop for a push connection.
//!
//! A connection is authenticated by the `token` query parameter, registered
//! under its user name, and then served by two halves: a writer task that
//! drains the connection's outbound queue into the socket, and the read loop
//! below that answers keep-alive pings until the client goes away. Either
//! half failing ends the connection and removes it from the registry.

use crate::{
    error::ApiError,
    web::{
        protocol::{ClientMessage, ServerMessage},
        state::AppState,
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    Sink, SinkExt,
};
use serde::Deserialize;
use std::sync::Arc;
use tasksync_core::ports::{PortError, PortResult, UserStore};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The sending half of the socket, shared by the writer task and the read loop.
type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

#[derive(Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// The handler for upgrading HTTP requests to WebSocket connections.
///
/// The token is checked before the upgrade, so a missing or bad token is a
/// plain 401.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
) -> Result<Response, ApiError> {
    let user = authenticate(app_state.users.as_ref(), params.token.as_deref()).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, app_state, user)))
}

/// Resolves the user behind the `token` query parameter.
async fn authenticate(users: &dyn UserStore, token: Option<&str>) -> PortResult<String> {
    let Some(token) = token else {
        debug!("Rejected push connection without a token");
        return Err(PortError::Unauthorized);
    };
    users.validate_auth_session(token).await.map_err(|e| {
        debug!("Rejected push connection: {}", e);
        PortError::Unauthorized
    })
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user: String) {
    info!("New push connection established for user: {}", user);

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Registration ---
    let (connection_id, outbound) = app_state.registry.register(&user).await;
    let token = CancellationToken::new();
    let writer = tokio::spawn(write_outbound(
        ws_sender.clone(),
        outbound,
        token.clone(),
        user.clone(),
    ));

    // --- 2. Main Message Loop ---
    loop {
        let msg = tokio::select! {
            // The writer cancels when the socket stopped taking messages.
            _ = token.cancelled() => break,
            msg = receiver.next() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) = handle_text_message(text.as_str(), &ws_sender).await {
                    warn!("Failed to answer {}: {}", user, e);
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {} closed the push connection.", user);
                break;
            }
            // Protocol-level pings are answered by the socket itself.
            Ok(_) => {}
            Err(e) => {
                warn!("Push connection of {} failed: {}", user, e);
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    if !app_state.registry.unregister(&user, connection_id).await {
        debug!("Push connection of {} was already replaced", user);
    }
    token.cancel();
    if let Err(e) = writer.await {
        warn!("Writer task of {} ended abnormally: {}", user, e);
    }
    info!("Push connection of {} closed.", user);
}

/// Handles one text frame sent by the client.
async fn handle_text_message<S>(text: &str, ws_sender: &Arc<Mutex<S>>) -> Result<(), ApiError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => ServerMessage::Pong,
        Err(e) => {
            debug!("Ignoring malformed client message: {}", e);
            ServerMessage::Error {
                message: "Unsupported message.".to_string(),
            }
        }
    };
    send_message(ws_sender, &reply).await
}

/// Forwards queued notifications to the socket until cancelled or the queue
/// closes. A failed write cancels `token`, which ends the whole connection.
async fn write_outbound<S>(
    ws_sender: Arc<Mutex<S>>,
    mut outbound: mpsc::Receiver<ServerMessage>,
    token: CancellationToken,
    user: String,
) where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            message = outbound.recv() => {
                // A closed queue means a newer connection replaced this one.
                let Some(message) = message else { break };
                if let Err(e) = send_message(&ws_sender, &message).await {
                    warn!("Failed to push to {}: {}", user, e);
                    token.cancel();
                    break;
                }
            }
        }
    }
}

async fn send_message<S>(ws_sender: &Arc<Mutex<S>>, message: &ServerMessage) -> Result<(), ApiError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(message)
        .map_err(|e| ApiError::Internal(format!("Failed to encode push message: {}", e)))?;
    ws_sender.lock().await.send(Message::Text(json.into())).await?;
    Ok(())
}
