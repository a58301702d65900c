// ============================
// coedit-backend-lib/src/ws_router.rs
// ============================
//! HTTP routes and the WebSocket bridge into the session protocol.
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::{future, SinkExt, StreamExt};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::hub::{ChannelConn, ClientConn};
use crate::metrics::{LOGIN_ACCEPTED, LOGIN_REJECTED, WS_ACTIVE, WS_CONNECTION, WS_DISCONNECTION};
use crate::session::FrameStream;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub id: Option<String>,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/login", post(login_handler))
        .route("/session/{id}", get(session_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reserve a client id for a username
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    match state.session.login(&request.username).await {
        Ok(id) => {
            counter!(LOGIN_ACCEPTED).increment(1);
            Ok(Json(LoginResponse { id }))
        },
        Err(e) => {
            counter!(LOGIN_REJECTED).increment(1);
            Err(e)
        },
    }
}

/// Check a client id before the editor page opens its socket
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.session.validate_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    } else {
        (StatusCode::OK, "ok")
    }
}

/// Handler for WebSocket connections
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match params.id {
        Some(id) => ws.on_upgrade(move |socket| handle_socket(socket, id, state)),
        None => ws.on_upgrade(|mut socket| async move {
            tracing::info!("websocket without id, closing");
            let _ = socket.send(Message::Close(None)).await;
        }),
    }
}

async fn handle_socket(socket: WebSocket, id: String, state: Arc<AppState>) {
    counter!(WS_CONNECTION).increment(1);
    gauge!(WS_ACTIVE).increment(1.0);

    let (mut sink, stream) = socket.split();

    // the queue is the client's connection handle; one task drains it into the socket
    let (client_tx, mut client_rx) = mpsc::channel::<String>(state.settings.channel_capacity);
    let send_task = tokio::spawn(async move {
        while let Some(frame) = client_rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    let frames: FrameStream = stream
        .take_while(|message| {
            future::ready(matches!(message, Ok(message) if !matches!(message, Message::Close(_))))
        })
        .filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                _ => None,
            })
        })
        .boxed();

    let conn: Arc<dyn ClientConn> = Arc::new(ChannelConn::new(client_tx));

    match state.session.handle_connection(&id, conn, frames).await {
        Ok(reason) => tracing::info!(client_id = %id, %reason, "session ended"),
        Err(e) => tracing::error!(client_id = %id, error = %e, "session failed"),
    }

    // every sender is gone once the session has returned
    if let Err(e) = send_task.await {
        tracing::error!(error = %e, "websocket writer");
    }

    counter!(WS_DISCONNECTION).increment(1);
    gauge!(WS_ACTIVE).decrement(1.0);
}
