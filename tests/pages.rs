//! Page and static asset smoke tests

use std::time::Duration;

use axum::http::StatusCode;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

mod common;
use common::{get_text, spawn_mock, TestServer};

type ReloadSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Read the next text frame as JSON
async fn next_json(socket: &mut ReloadSocket) -> Value {
    let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("no frame within 5s")
        .expect("socket closed")
        .expect("socket error");
    serde_json::from_str(message.to_text().unwrap()).unwrap()
}

#[tokio::test]
async fn test_index_renders_chat_page() {
    let app = TestServer::default().router();

    let (status, html) = get_text(app, "/").await;
    assert_eq!(status, StatusCode::OK);

    assert!(html.contains(r#"id="recordBtn""#));
    assert!(html.contains(r#"id="status""#));
    assert!(html.contains(r#"id="chatContainer""#));
    assert!(html.contains(r#"<script src="/script.js"></script>"#));
    assert!(html.contains("<title>Test Chat</title>"));
    assert!(html.contains(r#"data-lang="en-US""#));
    assert!(html.contains(r#"data-voice="shimmer""#));
    assert!(html.contains(r#"data-system-prompt="Be kind""#));
    assert!(!html.contains("{{"));
}

#[tokio::test]
async fn test_index_has_no_live_reload_by_default() {
    let app = TestServer::default().router();

    let (_, html) = get_text(app.clone(), "/").await;
    assert!(!html.contains("/livereload.js"));

    let (status, _) = get_text(app, "/livereload.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_index_injects_live_reload_in_dev() {
    let app = TestServer {
        live_reload: true,
        ..Default::default()
    }
    .router();

    let (_, html) = get_text(app.clone(), "/").await;
    assert!(html.contains(r#"<script src="/livereload.js"></script>"#));

    let (status, script) = get_text(app, "/livereload.js").await;
    assert_eq!(status, StatusCode::OK);
    assert!(script.contains("/livereload"));
    assert!(script.contains("location.reload()"));
}

#[tokio::test]
async fn test_live_reload_socket_pushes_changes() {
    let server = TestServer {
        live_reload: true,
        ..Default::default()
    }
    .build();
    let state = server.state();
    let base = spawn_mock(server.router()).await;

    let url = format!("{}/livereload", base.replacen("http://", "ws://", 1));
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    assert_eq!(next_json(&mut socket).await, json!({ "type": "connected" }));

    let reload = state.live_reload.as_ref().unwrap();
    assert_eq!(reload.notify("index.html"), 1);

    assert_eq!(
        next_json(&mut socket).await,
        json!({ "type": "reload", "path": "index.html" })
    );
}

#[tokio::test]
async fn test_static_script_is_served() {
    let app = TestServer::default().router();

    let (status, script) = get_text(app, "/script.js").await;
    assert_eq!(status, StatusCode::OK);
    assert!(script.contains("function addChatBubble"));
    assert!(script.contains("'/chat-text'"));
    assert!(script.contains("data:audio/mp3;base64,"));
}

#[tokio::test]
async fn test_static_stylesheet_is_served() {
    let app = TestServer::default().router();

    let (status, css) = get_text(app, "/style.css").await;
    assert_eq!(status, StatusCode::OK);
    assert!(css.contains(".bubble"));
}

#[tokio::test]
async fn test_unknown_asset_is_404() {
    let app = TestServer::default().router();

    let (status, _) = get_text(app, "/missing.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
