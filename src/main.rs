use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parley_gateway::config::DEFAULT_GENERATE_URL;
use parley_gateway::{ApiServerBuilder, Config, ConfigOverrides, GenerateClient};

/// Parley - voice chat front-end for a text-generation service
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "PARLEY_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PARLEY_PORT")]
    port: Option<u16>,

    /// Base URL of the generation service (`/generate` is appended)
    #[arg(long, env = "PARLEY_GENERATE_URL")]
    generate_url: Option<String>,

    /// Generation request timeout in seconds
    #[arg(long, env = "PARLEY_GENERATE_TIMEOUT_SECS")]
    generate_timeout_secs: Option<u64>,

    /// Directory of static assets
    #[arg(long, env = "PARLEY_PUBLIC_DIR")]
    public_dir: Option<PathBuf>,

    /// Directory of page templates
    #[arg(long, env = "PARLEY_VIEWS_DIR")]
    views_dir: Option<PathBuf>,

    /// Reload open pages when views or assets change
    #[arg(long, env = "PARLEY_LIVE_RELOAD")]
    dev: bool,

    /// Config file (defaults to ~/.config/parley/config.toml)
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// API key for speech chat
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Base URL of the speech chat API
    #[arg(long, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    /// Audio chat model
    #[arg(long, env = "PARLEY_CHAT_MODEL")]
    chat_model: Option<String>,

    /// Transcription model
    #[arg(long, env = "PARLEY_TRANSCRIBE_MODEL")]
    transcribe_model: Option<String>,

    /// Default reply voice
    #[arg(long, env = "PARLEY_VOICE")]
    voice: Option<String>,

    /// Default system prompt for spoken replies
    #[arg(long, env = "PARLEY_SYSTEM_PROMPT")]
    system_prompt: Option<String>,

    /// Speech recognition language (e.g. "ko-KR")
    #[arg(long, env = "PARLEY_LANG")]
    lang: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send a message to a running server and print the reply
    Ask {
        /// Message to send
        message: String,
        /// Server URL
        #[arg(long, default_value = "http://localhost:3000")]
        server: String,
    },
    /// Send a prompt straight to the generation service
    Check {
        /// Prompt to send
        #[arg(default_value = "Hello")]
        prompt: String,
    },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            host: self.host.clone(),
            port: self.port,
            generate_url: self.generate_url.clone(),
            generate_timeout_secs: self.generate_timeout_secs,
            public_dir: self.public_dir.clone(),
            views_dir: self.views_dir.clone(),
            live_reload: self.dev.then_some(true),
            openai_api_key: self.openai_api_key.clone(),
            openai_base_url: self.openai_base_url.clone(),
            chat_model: self.chat_model.clone(),
            transcribe_model: self.transcribe_model.clone(),
            voice: self.voice.clone(),
            system_prompt: self.system_prompt.clone(),
            lang: self.lang.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up logging based on verbosity, RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,parley_gateway=info",
        1 => "info,parley_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = cli.overrides();

    match cli.command {
        Some(Command::Ask { message, server }) => {
            println!("{}", ask(&server, &message).await?);
            return Ok(());
        }
        Some(Command::Check { prompt }) => {
            let config = Config::load(overrides)?;
            return check(&config, &prompt).await;
        }
        None => {}
    }

    let config = Config::load(overrides)?;
    tracing::debug!(?config, "loaded configuration");

    tracing::info!(
        addr = %config.listen_addr(),
        generate_url = %config.generate.url,
        live_reload = config.server.live_reload,
        "starting parley gateway"
    );

    if config.generate.url == DEFAULT_GENERATE_URL {
        tracing::info!("using default generation service URL, set PARLEY_GENERATE_URL to change");
    }

    ApiServerBuilder::from_config(&config)?.build().run().await?;

    Ok(())
}

/// Post a message to a running server's chat route and return the reply
async fn ask(server: &str, message: &str) -> anyhow::Result<String> {
    let url = format!("{}/chat", server.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({ "message": message }))
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        // proxies in front of the server may answer with HTML
        let error = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|body| body["error"].as_str().map(str::to_string))
            .unwrap_or_else(|| text.trim().to_string());
        anyhow::bail!("server answered {status}: {error}");
    }

    let body: serde_json::Value = serde_json::from_str(&text)?;
    body["reply"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("reply missing from server response"))
}

/// Send a prompt to the generation service directly
async fn check(config: &Config, prompt: &str) -> anyhow::Result<()> {
    let client = GenerateClient::new(&config.generate.url, config.generate.timeout)?;
    println!("Sending to {}...", client.endpoint());

    let reply = client.generate(prompt).await?;
    println!("{reply}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn ask_returns_reply() {
        let server = serve(Router::new().route(
            "/chat",
            post(|| async { Json(serde_json::json!({ "reply": "hello there" })) }),
        ))
        .await;

        assert_eq!(ask(&server, "hi").await.unwrap(), "hello there");
    }

    #[tokio::test]
    async fn ask_reports_json_error() {
        let server = serve(Router::new().route(
            "/chat",
            post(|| async {
                let body = Json(serde_json::json!({ "error": "AI server response error" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }),
        ))
        .await;

        let err = ask(&server, "hi").await.unwrap_err().to_string();
        assert!(err.contains("500"), "{err}");
        assert!(err.contains("AI server response error"), "{err}");
    }

    #[tokio::test]
    async fn ask_reports_status_for_non_json_error() {
        let server = serve(Router::new().route(
            "/chat",
            post(|| async { (StatusCode::BAD_GATEWAY, "<html>Bad Gateway</html>") }),
        ))
        .await;

        let err = ask(&server, "hi").await.unwrap_err().to_string();
        assert!(err.starts_with("server answered 502"), "{err}");
        assert!(err.contains("Bad Gateway"), "{err}");
    }
}
