//! Parley Gateway - voice chat front-end for a text-generation service
//!
//! The gateway serves a browser page that records speech, and relays the
//! transcribed text to backend services:
//! - `POST /chat` proxies `{message}` to an external `/generate` endpoint
//! - `POST /chat-text` and `POST /chat-audio` answer with text and
//!   synthesized speech through an OpenAI-compatible API
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        Browser (speech recognition)          │
//! └─────────────────────┬────────────────────────┘
//!                       │
//! ┌─────────────────────▼────────────────────────┐
//! │               Parley Gateway                 │
//! │  Pages │ Chat proxy │ Speech chat │ Reload   │
//! └──────────┬───────────────────┬───────────────┘
//!            │                   │
//! ┌──────────▼─────────┐ ┌───────▼───────────────┐
//! │ Generation service │ │ Audio chat / STT API  │
//! └────────────────────┘ └───────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod generate;
pub mod livereload;
pub mod speech;
pub mod views;

pub use api::{ApiServer, ApiServerBuilder, ApiState};
pub use config::{Config, ConfigOverrides};
pub use error::{Error, Result};
pub use generate::GenerateClient;
pub use livereload::{LiveReload, ReloadEvent};
pub use speech::{SpeechClient, SpokenReply};
pub use views::{TemplateContext, Views};
