//! Shared test utilities

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::Multipart,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use parley_gateway::config::SpeechConfig;
use parley_gateway::{
    ApiServer, ApiServerBuilder, GenerateClient, LiveReload, SpeechClient, TemplateContext, Views,
};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_mock(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock");
    let addr = listener.local_addr().expect("mock has no address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server failed");
    });
    format!("http://{addr}")
}

/// Base URL of a port nothing listens on
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no address");
    drop(listener);
    format!("http://{addr}")
}

/// Base URL of a server that accepts connections but never answers
pub async fn silent_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no address");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}")
}

/// Generation service that echoes the prompt in a `response` field
pub async fn echo_generate_service() -> String {
    spawn_mock(Router::new().route(
        "/generate",
        post(|Json(body): Json<Value>| async move {
            let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
            Json(json!({ "response": format!("echo: {prompt}") }))
        }),
    ))
    .await
}

/// Generation service that always answers with `status` and `body`
pub async fn fixed_generate_service(status: StatusCode, body: Value) -> String {
    spawn_mock(Router::new().route(
        "/generate",
        post(move || async move { (status, Json(body)).into_response() }),
    ))
    .await
}

/// OpenAI-compatible API whose chat completion echoes voice and user text
pub async fn echo_speech_service() -> String {
    let router = Router::new()
        .route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                let voice = body["audio"]["voice"].as_str().unwrap_or_default();
                let system = body["messages"][0]["content"].as_str().unwrap_or_default();
                let user = body["messages"][1]["content"].as_str().unwrap_or_default();
                let transcript = format!("voice={voice}; system={system}; user={user}");
                Json(json!({
                    "choices": [{
                        "message": {
                            "content": null,
                            "audio": { "id": "audio_1", "data": "QUJD", "transcript": transcript }
                        }
                    }]
                }))
            }),
        )
        .route(
            "/v1/audio/transcriptions",
            post(|form: Multipart| transcription(form, "I feel overwhelmed")),
        );
    format!("{}/v1", spawn_mock(router).await)
}

/// OpenAI-compatible API that transcribes every recording as silence
pub async fn silent_speech_service() -> String {
    let router = Router::new()
        .route(
            "/v1/chat/completions",
            post(|| async {
                (StatusCode::INTERNAL_SERVER_ERROR, "chat should not be called").into_response()
            }),
        )
        .route(
            "/v1/audio/transcriptions",
            post(|form: Multipart| transcription(form, "  ")),
        );
    format!("{}/v1", spawn_mock(router).await)
}

/// Answer a transcription upload with `text`, or 400 unless it carries a
/// non-empty `audio.wav` file part and the expected `model` field
async fn transcription(mut form: Multipart, text: &'static str) -> Response {
    let mut file_name = None;
    let mut file_len = 0;
    let mut model = None;

    while let Ok(Some(field)) = form.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                file_len = field.bytes().await.map(|b| b.len()).unwrap_or_default();
            }
            "model" => model = field.text().await.ok(),
            _ => {}
        }
    }

    if file_name.as_deref() != Some("audio.wav")
        || file_len == 0
        || model.as_deref() != Some("gpt-4o-transcribe")
    {
        let message = format!("bad upload: file={file_name:?} ({file_len} bytes), model={model:?}");
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": { "message": message } })))
            .into_response();
    }

    Json(json!({ "text": text })).into_response()
}

/// OpenAI-compatible API whose chat completion has no choices
pub async fn empty_speech_service() -> String {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(json!({ "choices": [] })) }),
    );
    format!("{}/v1", spawn_mock(router).await)
}

/// OpenAI-compatible API that fails every request
pub async fn failing_speech_service() -> String {
    let fail = || async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") };
    let router = Router::new()
        .route("/v1/chat/completions", post(fail))
        .route("/v1/audio/transcriptions", post(fail));
    format!("{}/v1", spawn_mock(router).await)
}

/// Repository directory holding the page templates
pub fn views_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("views")
}

/// Repository directory holding the static assets
pub fn public_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("public")
}

pub fn test_page() -> TemplateContext {
    TemplateContext {
        title: "Test Chat".to_string(),
        lang: "en-US".to_string(),
        voice: "shimmer".to_string(),
        system_prompt: "Be kind".to_string(),
    }
}

/// Options for building a test server
#[derive(Default)]
pub struct TestServer {
    pub generate_url: Option<String>,
    pub speech_url: Option<String>,
    pub live_reload: bool,
}

impl TestServer {
    pub fn build(self) -> ApiServer {
        let generate_url = self
            .generate_url
            .unwrap_or_else(|| "http://127.0.0.1:9".to_string());
        let generate =
            GenerateClient::new(&generate_url, Duration::from_secs(5)).expect("generate client");

        let mut builder = ApiServerBuilder::new(
            generate,
            Views::new(views_dir(), self.live_reload),
            test_page(),
        )
        .static_dir(Some(public_dir()));

        if let Some(base_url) = self.speech_url {
            let speech = SpeechClient::new(&SpeechConfig {
                api_key: Some("test-key".to_string()),
                base_url,
                chat_model: "gpt-4o-audio-preview".to_string(),
                transcribe_model: "gpt-4o-transcribe".to_string(),
                voice: "shimmer".to_string(),
                system_prompt: "Be kind".to_string(),
            })
            .expect("speech client");
            builder = builder.speech(speech);
        }

        if self.live_reload {
            builder = builder.live_reload(LiveReload::new());
        }

        builder.build()
    }

    pub fn router(self) -> Router {
        self.build().router()
    }
}

/// Send a request through the router and return status and body bytes
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body)
}

/// POST a JSON body and return status and parsed JSON
pub async fn post_json(router: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = send(router, request).await;
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// GET a URI and return status and body text
pub async fn get_text(router: Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, bytes) = send(router, request).await;
    (status, String::from_utf8_lossy(&bytes).into_owned())
}
