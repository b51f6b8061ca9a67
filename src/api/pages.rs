//! Page rendering and the live reload socket

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use super::ApiState;
use crate::livereload::LiveReload;

/// Browser side of live reload
const LIVE_RELOAD_JS: &str = include_str!("../../assets/livereload.js");

/// Build page router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(index))
        .with_state(state)
}

/// Build live reload router (mounted only when live reload is enabled)
pub fn live_reload_router(reload: LiveReload) -> Router {
    Router::new()
        .route("/livereload", get(ws_upgrade))
        .route("/livereload.js", get(live_reload_script))
        .with_state(reload)
}

/// Render the chat page
async fn index(State(state): State<Arc<ApiState>>) -> Response {
    match state.views.render("index", &state.page) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render index");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render page").into_response()
        }
    }
}

async fn live_reload_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        LIVE_RELOAD_JS,
    )
}

/// Outgoing live reload message
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadWsOutgoing {
    /// Connection established
    Connected,
    /// A watched file changed
    Reload { path: String },
}

async fn ws_upgrade(State(reload): State<LiveReload>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, reload))
}

async fn handle_socket(socket: WebSocket, reload: LiveReload) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = reload.subscribe();

    if send_json(&mut sender, &ReloadWsOutgoing::Connected).await.is_err() {
        return;
    }
    tracing::debug!("live reload client connected");

    let mut forward_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let msg = ReloadWsOutgoing::Reload { path: event.path };
                    if send_json(&mut sender, &msg).await.is_err() {
                        break;
                    }
                }
                // a reload is a reload, skipped ones don't matter
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Drain client frames so close is noticed
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward_task => recv_task.abort(),
        _ = &mut recv_task => forward_task.abort(),
    }

    tracing::debug!("live reload client disconnected");
}

async fn send_json<S>(sender: &mut S, msg: &ReloadWsOutgoing) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let text = serde_json::to_string(msg).map_err(|_| ())?;
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}
