//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::base::prompts;

use super::types::Res;

/// Default Ollama host.
fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

/// Default sampling temperature for the Ollama model.
fn default_ollama_temperature() -> f32 {
    0.7
}

/// Default per-attempt inference timeout, in seconds.
///
/// Local models can take a while to load on first use.
fn default_inference_timeout_secs() -> u64 {
    120
}

/// Default for probing the inference engine at startup.
fn default_inference_startup_check() -> bool {
    true
}

/// Default number of trailing thread messages to give a general chat request.
fn default_chat_context_window() -> usize {
    0
}

/// Default summarization directive.
fn default_summary_directive() -> String {
    prompts::SUMMARY_DIRECTIVE.to_string()
}

/// Default chat directive.
fn default_chat_directive() -> String {
    prompts::CHAT_DIRECTIVE.to_string()
}

/// Configuration for the mention-bot application.
///
/// Immutable after load; cloning only bumps a reference count.
#[derive(Debug, Clone)]
pub struct Config {
    /// The loaded values.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The configuration values, as read from the file and environment.
#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Slack app token (`MENTION_BOT_SLACK_APP_TOKEN`).
    pub slack_app_token: String,
    /// Slack bot token (`MENTION_BOT_SLACK_BOT_TOKEN`).
    pub slack_bot_token: String,
    /// Ollama model to use (`MENTION_BOT_OLLAMA_MODEL`).
    pub ollama_model: String,
    /// Ollama host (`MENTION_BOT_OLLAMA_HOST`).
    #[serde(default = "default_ollama_host")]
    pub ollama_host: String,
    /// Sampling temperature for the Ollama model (`MENTION_BOT_OLLAMA_TEMPERATURE`).
    /// Value between 0 and 2.
    #[serde(default = "default_ollama_temperature")]
    pub ollama_temperature: f32,
    /// Timeout for a single inference attempt, in seconds (`MENTION_BOT_INFERENCE_TIMEOUT_SECS`).
    #[serde(default = "default_inference_timeout_secs")]
    pub inference_timeout_secs: u64,
    /// Whether to send a probe prompt at startup, and refuse to start if it fails (`MENTION_BOT_INFERENCE_STARTUP_CHECK`).
    #[serde(default = "default_inference_startup_check")]
    pub inference_startup_check: bool,
    /// Trailing thread messages to fetch for general chat; `0` disables the fetch (`MENTION_BOT_CHAT_CONTEXT_WINDOW`).
    #[serde(default = "default_chat_context_window")]
    pub chat_context_window: usize,
    /// Optional custom summarization directive (`MENTION_BOT_SUMMARY_DIRECTIVE`).
    #[serde(default = "default_summary_directive")]
    pub summary_directive: String,
    /// Optional custom chat directive (`MENTION_BOT_CHAT_DIRECTIVE`).
    #[serde(default = "default_chat_directive")]
    pub chat_directive: String,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            slack_app_token: String::new(),
            slack_bot_token: String::new(),
            ollama_model: String::new(),
            ollama_host: default_ollama_host(),
            ollama_temperature: default_ollama_temperature(),
            inference_timeout_secs: default_inference_timeout_secs(),
            inference_startup_check: default_inference_startup_check(),
            chat_context_window: default_chat_context_window(),
            summary_directive: default_summary_directive(),
            chat_directive: default_chat_directive(),
        }
    }
}

impl ConfigInner {
    /// The per-attempt inference timeout.
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

impl Config {
    /// Load from `explicit_path` (or `.hidden/config.toml`), then `MENTION_BOT_*` env vars, and validate.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder();

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        // Environment variables take precedence over the file.
        cfg = cfg.add_source(config::Environment::default().prefix("MENTION_BOT"));

        let result = Config::from(cfg.build()?.try_deserialize::<ConfigInner>()?);

        result.validate()?;

        Ok(result)
    }

    /// Check the invariants that serde cannot express.
    pub fn validate(&self) -> Res<()> {
        if self.ollama_model.trim().is_empty() {
            return Err(anyhow::anyhow!("Ollama model must be set."));
        }

        if !self.ollama_host.starts_with("http://") && !self.ollama_host.starts_with("https://") {
            return Err(anyhow::anyhow!("Ollama host must be an http(s) URL."));
        }

        if self.ollama_temperature < 0.0 || self.ollama_temperature > 2.0 {
            return Err(anyhow::anyhow!("Ollama temperature must be between 0 and 2."));
        }

        if self.inference_timeout_secs < 1 {
            return Err(anyhow::anyhow!("Inference timeout must be at least 1 second."));
        }

        Ok(())
    }
}

// Tests.
