use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::context::ContextSources;

pub const DEFAULT_BIND: &str = "127.0.0.1:8501";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Settings read from `config.toml`. Every field is optional; unset fields
/// fall back to the defaults above.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the web server listens on (e.g., "0.0.0.0:8501")
    pub bind: Option<String>,
    /// Model identifier sent with every completion request
    pub model: Option<String>,
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub base_url: Option<String>,
    /// Plain-text reference document
    pub text_source: Option<PathBuf>,
    /// Turtle ontology flattened into the context
    pub ontology_source: Option<PathBuf>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn bind_address(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn context_sources(&self) -> ContextSources {
        let defaults = ContextSources::default();
        ContextSources {
            text_path: self.text_source.clone().unwrap_or(defaults.text_path),
            ontology_path: self
                .ontology_source
                .clone()
                .unwrap_or(defaults.ontology_path),
        }
    }

    /// Applies command-line overrides on top of file values.
    pub fn with_overrides(mut self, bind: Option<String>, model: Option<String>) -> Self {
        if bind.is_some() {
            self.bind = bind;
        }
        if model.is_some() {
            self.model = model;
        }
        self
    }
}
