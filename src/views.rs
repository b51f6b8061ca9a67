//! Page template rendering
//!
//! Templates are plain HTML files in the views directory with `{{key}}`
//! placeholders. Files are read on every render so edits show up without a
//! restart.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::{Error, Result};

/// Script tag injected when live reload is enabled
pub const LIVE_RELOAD_SNIPPET: &str = r#"<script src="/livereload.js"></script>"#;

/// Values substituted into page templates
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub title: String,
    pub lang: String,
    pub voice: String,
    pub system_prompt: String,
}

impl TemplateContext {
    /// Build the page context from configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            title: config.page.title.clone(),
            lang: config.page.lang.clone(),
            voice: config.speech.voice.clone(),
            system_prompt: config.speech.system_prompt.clone(),
        }
    }

    fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("title", &self.title),
            ("lang", &self.lang),
            ("voice", &self.voice),
            ("system_prompt", &self.system_prompt),
        ]
    }
}

/// Renders HTML templates from a directory
#[derive(Debug, Clone)]
pub struct Views {
    dir: PathBuf,
    live_reload: bool,
}

impl Views {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, live_reload: bool) -> Self {
        Self {
            dir: dir.into(),
            live_reload,
        }
    }

    /// Directory templates are read from
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render `<dir>/<name>.html` with `context`
    ///
    /// # Errors
    ///
    /// Returns error if the name is not a plain file stem or the template
    /// cannot be read
    pub fn render(&self, name: &str, context: &TemplateContext) -> Result<String> {
        if name.is_empty() || name.contains(['/', '\\', '.']) {
            return Err(Error::Template(format!("invalid template name '{name}'")));
        }

        let path = self.dir.join(format!("{name}.html"));
        let source = std::fs::read_to_string(&path).map_err(|e| {
            Error::Template(format!("failed to read {}: {e}", path.display()))
        })?;

        let mut html = substitute(&source, context);
        if self.live_reload {
            html = inject_live_reload(&html);
        }

        tracing::debug!(template = name, bytes = html.len(), "rendered template");
        Ok(html)
    }
}

/// Replace known `{{key}}` placeholders with escaped values
///
/// Whitespace inside the braces is allowed (`{{ key }}`). Unknown keys are
/// left as written.
fn substitute(source: &str, context: &TemplateContext) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let key = after[..end].trim();
        match context.pairs().iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(&escape_html(value)),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Insert the live reload script before `</body>`, or append it
fn inject_live_reload(html: &str) -> String {
    match html.rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + LIVE_RELOAD_SNIPPET.len() + 1);
            out.push_str(&html[..idx]);
            out.push_str(LIVE_RELOAD_SNIPPET);
            out.push('\n');
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{html}{LIVE_RELOAD_SNIPPET}"),
    }
}

/// Escape text for use in HTML content and quoted attributes
#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
