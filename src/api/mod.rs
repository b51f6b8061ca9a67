//! HTTP server for the Parley gateway

pub mod chat;
pub mod health;
pub mod pages;
pub mod voice;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::generate::GenerateClient;
use crate::livereload::{LiveReload, WatchGuard};
use crate::speech::SpeechClient;
use crate::views::{TemplateContext, Views};
use crate::Result;

/// Shared state for API handlers
pub struct ApiState {
    /// Client for the external generation service
    pub generate: GenerateClient,
    /// Speech chat client, present only when an API key is configured
    pub speech: Option<SpeechClient>,
    pub views: Views,
    pub page: TemplateContext,
    /// Voice used when a request names none
    pub default_voice: String,
    /// System prompt used when a request carries none
    pub default_system_prompt: String,
    /// Set when live reload is enabled
    pub live_reload: Option<LiveReload>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    generate: GenerateClient,
    speech: Option<SpeechClient>,
    views: Views,
    page: TemplateContext,
    default_voice: String,
    default_system_prompt: String,
    live_reload: Option<LiveReload>,
    static_dir: Option<PathBuf>,
    addr: String,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(generate: GenerateClient, views: Views, page: TemplateContext) -> Self {
        Self {
            generate,
            speech: None,
            default_voice: page.voice.clone(),
            default_system_prompt: page.system_prompt.clone(),
            views,
            page,
            live_reload: None,
            static_dir: None,
            addr: format!("0.0.0.0:{}", crate::config::DEFAULT_PORT),
        }
    }

    /// Create a builder with every component wired from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the generation client cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let generate = GenerateClient::new(&config.generate.url, config.generate.timeout)?;
        let views = Views::new(&config.server.views_dir, config.server.live_reload);
        let page = TemplateContext::from_config(config);

        let speech = match SpeechClient::new(&config.speech) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "speech chat disabled");
                None
            }
        };

        let mut builder = Self::new(generate, views, page)
            .addr(config.listen_addr())
            .static_dir(Some(config.server.public_dir.clone()));

        if let Some(client) = speech {
            builder = builder.speech(client);
        }
        if config.server.live_reload {
            builder = builder.live_reload(LiveReload::new());
        }

        Ok(builder)
    }

    /// Set the speech chat client
    #[must_use]
    pub fn speech(mut self, client: SpeechClient) -> Self {
        self.speech = Some(client);
        self
    }

    /// Enable live reload with the given notifier
    #[must_use]
    pub fn live_reload(mut self, reload: LiveReload) -> Self {
        self.live_reload = Some(reload);
        self
    }

    /// Set the static files directory
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Set the listen address (`host:port`)
    #[must_use]
    pub fn addr(mut self, addr: String) -> Self {
        self.addr = addr;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            generate: self.generate,
            speech: self.speech,
            views: self.views,
            page: self.page,
            default_voice: self.default_voice,
            default_system_prompt: self.default_system_prompt,
            live_reload: self.live_reload,
        });

        ApiServer {
            state,
            addr: self.addr,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    addr: String,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Shared handler state
    #[must_use]
    pub fn state(&self) -> Arc<ApiState> {
        self.state.clone()
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(pages::router(self.state.clone()))
            .merge(chat::router(self.state.clone()))
            .merge(voice::router(self.state.clone()))
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()));

        if let Some(reload) = &self.state.live_reload {
            router = router.merge(pages::live_reload_router(reload.clone()));
        }

        if let Some(static_dir) = &self.static_dir {
            router = router.fallback_service(ServeDir::new(static_dir));
            tracing::debug!(path = %static_dir.display(), "serving static files");
        }

        // The browser page and external tools may call from other origins
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Directories watched for live reload
    fn watch_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.state.views.dir().to_path_buf()];
        if let Some(static_dir) = &self.static_dir {
            dirs.push(static_dir.clone());
        }
        dirs
    }

    /// Run the API server until ctrl-c
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run, or the live reload
    /// watcher cannot start
    pub async fn run(self) -> Result<()> {
        let _watch: Option<WatchGuard> = match &self.state.live_reload {
            Some(reload) => Some(reload.watch(&self.watch_dirs())?),
            None => None,
        };

        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind {}: {e}", self.addr)))?;

        tracing::info!(
            addr = %self.addr,
            generate = %self.state.generate.endpoint(),
            speech = self.state.speech.is_some(),
            live_reload = self.state.live_reload.is_some(),
            "server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::Error::Config(format!("server error: {e}")))?;

        tracing::info!("server stopped");
        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
