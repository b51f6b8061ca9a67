//! Configuration management for Parley gateway
//!
//! Values are layered: built-in defaults, then the optional TOML file,
//! then CLI flags and environment variables (both arrive through
//! [`ConfigOverrides`]).

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::{Error, Result};
use file::ParleyConfigFile;

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Default generation service base URL
pub const DEFAULT_GENERATE_URL: &str = "http://localhost:5001";

/// Default speech chat API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Voices accepted by the speech chat model
pub const VOICES: &[&str] = &["alloy", "ash", "ballad", "coral", "echo", "sage", "shimmer"];

/// System prompt sent with every spoken turn unless overridden
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a GPT-4o audio response bot acting as a youth counselor assistant.
Always respond in English with a soft, sincere, and comforting voice.
Speak to teenagers facing emotional, social, or personal challenges.
Your tone must be warm, caring, empathetic, and reassuring, like a safe, supportive friend.
Try to keep responses concise, clear, and kind.
Never judge. Just listen, support, and gently guide with compassion.";

/// Parley gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Web server configuration
    pub server: ServerConfig,

    /// Generation service configuration
    pub generate: GenerateConfig,

    /// Speech chat configuration
    pub speech: SpeechConfig,

    /// Page template values
    pub page: PageConfig,
}

/// Web server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Static assets served as the router fallback
    pub public_dir: PathBuf,

    /// Page templates
    pub views_dir: PathBuf,

    /// Watch views and assets and push reloads to open pages
    pub live_reload: bool,
}

/// Generation service configuration
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Base URL of the service exposing `POST /generate`
    pub url: String,
    pub timeout: Duration,
}

/// Speech chat configuration (OpenAI-compatible API)
#[derive(Clone)]
pub struct SpeechConfig {
    /// API key; speech routes answer 503 without one
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub transcribe_model: String,
    pub voice: String,
    pub system_prompt: String,
}

impl std::fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("transcribe_model", &self.transcribe_model)
            .field("voice", &self.voice)
            .finish_non_exhaustive()
    }
}

/// Page template values
#[derive(Debug, Clone)]
pub struct PageConfig {
    pub title: String,
    pub lang: String,
}

/// Values supplied by CLI flags or environment variables
///
/// Every field left `None` falls through to the config file, then defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub generate_url: Option<String>,
    pub generate_timeout_secs: Option<u64>,
    pub public_dir: Option<PathBuf>,
    pub views_dir: Option<PathBuf>,
    pub live_reload: Option<bool>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub chat_model: Option<String>,
    pub transcribe_model: Option<String>,
    pub voice: Option<String>,
    pub system_prompt: Option<String>,
    pub lang: Option<String>,
}

impl Config {
    /// Load configuration from the config file and the given overrides
    ///
    /// # Errors
    ///
    /// Returns error if the merged configuration is invalid
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let file = file::load_config_file(overrides.config_path.as_deref());
        Self::resolve(file, overrides)
    }

    /// Merge a parsed config file with overrides and validate the result
    ///
    /// # Errors
    ///
    /// Returns error if the generation URL is not an http(s) URL, the voice
    /// is unknown, or the timeout is zero
    pub fn resolve(file: ParleyConfigFile, overrides: ConfigOverrides) -> Result<Self> {
        let server = ServerConfig {
            host: overrides
                .host
                .or(file.server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: overrides.port.or(file.server.port).unwrap_or(DEFAULT_PORT),
            public_dir: overrides
                .public_dir
                .or(file.server.public_dir)
                .unwrap_or_else(|| PathBuf::from("public")),
            views_dir: overrides
                .views_dir
                .or(file.server.views_dir)
                .unwrap_or_else(|| PathBuf::from("views")),
            live_reload: overrides
                .live_reload
                .or(file.server.live_reload)
                .unwrap_or(false),
        };

        let timeout_secs = overrides
            .generate_timeout_secs
            .or(file.generate.timeout_secs)
            .unwrap_or(60);
        if timeout_secs == 0 {
            return Err(Error::Config("generate timeout must be positive".to_string()));
        }

        let generate = GenerateConfig {
            url: overrides
                .generate_url
                .or(file.generate.url)
                .unwrap_or_else(|| DEFAULT_GENERATE_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        };
        validate_http_url(&generate.url)?;

        let speech = SpeechConfig {
            api_key: overrides
                .openai_api_key
                .or(file.speech.api_key)
                .filter(|k| !k.trim().is_empty()),
            base_url: overrides
                .openai_base_url
                .or(file.speech.base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            chat_model: overrides
                .chat_model
                .or(file.speech.chat_model)
                .unwrap_or_else(|| "gpt-4o-audio-preview".to_string()),
            transcribe_model: overrides
                .transcribe_model
                .or(file.speech.transcribe_model)
                .unwrap_or_else(|| "gpt-4o-transcribe".to_string()),
            voice: overrides
                .voice
                .or(file.speech.voice)
                .unwrap_or_else(|| "shimmer".to_string()),
            system_prompt: overrides
                .system_prompt
                .or(file.speech.system_prompt)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        };
        validate_http_url(&speech.base_url)?;
        validate_voice(&speech.voice)?;

        let page = PageConfig {
            title: file.page.title.unwrap_or_else(|| "Voice Chat".to_string()),
            lang: overrides
                .lang
                .or(file.page.lang)
                .unwrap_or_else(|| "ko-KR".to_string()),
        };

        Ok(Self {
            server,
            generate,
            speech,
            page,
        })
    }

    /// Socket address string for the listener
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Ensure `url` parses and uses http or https
fn validate_http_url(url: &str) -> Result<()> {
    let parsed =
        Url::parse(url).map_err(|e| Error::Config(format!("invalid URL '{url}': {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "unsupported URL scheme '{other}' in '{url}'"
        ))),
    }
}

/// Check that `voice` is accepted by the speech chat model
///
/// # Errors
///
/// Returns error naming the accepted voices
pub fn validate_voice(voice: &str) -> Result<()> {
    if VOICES.contains(&voice) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "unknown voice '{voice}', expected one of: {}",
            VOICES.join(", ")
        )))
    }
}
