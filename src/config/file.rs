//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` as a persistent config source.
//! All fields are optional, the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfigFile {
    /// Web server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Generation service configuration
    #[serde(default)]
    pub generate: GenerateFileConfig,

    /// Speech chat configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Page template values
    #[serde(default)]
    pub page: PageFileConfig,
}

/// Web server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_dir: Option<PathBuf>,
    pub views_dir: Option<PathBuf>,
    pub live_reload: Option<bool>,
}

/// Generation service configuration
#[derive(Debug, Default, Deserialize)]
pub struct GenerateFileConfig {
    /// Base URL, `/generate` is appended
    pub url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Speech chat configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub chat_model: Option<String>,
    pub transcribe_model: Option<String>,
    pub voice: Option<String>,
    pub system_prompt: Option<String>,
}

/// Values rendered into the page template
#[derive(Debug, Default, Deserialize)]
pub struct PageFileConfig {
    pub title: Option<String>,

    /// BCP 47 tag for browser speech recognition (e.g. "ko-KR")
    pub lang: Option<String>,
}

/// Load the TOML config file from `path`, or the standard path when `None`
///
/// Returns `ParleyConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file(path: Option<&Path>) -> ParleyConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return ParleyConfigFile::default();
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file");
        return ParleyConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ParleyConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ParleyConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/parley/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parley").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let file: ParleyConfigFile = toml::from_str(
            r#"
            [server]
            port = 8080

            [speech]
            voice = "alloy"
            "#,
        )
        .unwrap();

        assert_eq!(file.server.port, Some(8080));
        assert!(file.server.host.is_none());
        assert_eq!(file.speech.voice.as_deref(), Some("alloy"));
        assert!(file.generate.url.is_none());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = load_config_file(Some(&dir.path().join("nope.toml")));
        assert!(file.server.port.is_none());
    }

    #[test]
    fn invalid_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server = [not toml").unwrap();

        let file = load_config_file(Some(&path));
        assert!(file.server.port.is_none());
    }

    #[test]
    fn reads_file_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[generate]\nurl = \"http://gen:9000\"\ntimeout_secs = 5\n").unwrap();

        let file = load_config_file(Some(&path));
        assert_eq!(file.generate.url.as_deref(), Some("http://gen:9000"));
        assert_eq!(file.generate.timeout_secs, Some(5));
    }
}
