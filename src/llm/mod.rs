//! Text-generation provider infrastructure.
//!
//! This module provides the provider trait and its concrete backends.
//! Comment-specific prompting and shaping lives in `crate::generate`.
//!
//! # Configuration
//!
//! Provider settings can be configured via:
//! - CLI arguments: `--provider`, `--model`, `--fallback-model`, `--base-url`,
//!   `--api-key`, `--provider-command`
//! - Environment variables: `GHOST_COMMENTER_PROVIDER`, `GHOST_COMMENTER_MODEL`,
//!   `GHOST_COMMENTER_FALLBACK_MODEL`, `GHOST_COMMENTER_BASE_URL`,
//!   `GHOST_COMMENTER_COMMAND`, `OPENAI_API_KEY`, `GHOST_COMMENTER_API_KEY_FILE`
//!
//! CLI arguments take precedence over environment variables.

mod chat;
mod command;

pub use chat::ChatCompletionsClient;
pub use command::CommandClient;

use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use log::warn;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);
pub const DEFAULT_MAX_RETRIES: usize = 3;

const FREE_BASE_URL: &str = "http://localhost:1337/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Available generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// Free aggregator exposing an OpenAI-compatible endpoint (default)
    #[default]
    Free,
    /// Paid OpenAI API
    OpenAi,
    /// Any CLI that reads a prompt on stdin and prints the completion
    Command,
}

impl LlmProvider {
    fn default_model(&self) -> &'static str {
        match self {
            Self::Free => "gpt-4",
            Self::OpenAi => "gpt-4o-mini",
            Self::Command => "",
        }
    }

    fn default_fallback_model(&self) -> Option<&'static str> {
        match self {
            Self::Free => Some("gpt-3.5-turbo"),
            Self::OpenAi | Self::Command => None,
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::OpenAi => write!(f, "openai"),
            Self::Command => write!(f, "command"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" | "g4f" => Ok(Self::Free),
            "openai" => Ok(Self::OpenAi),
            "command" => Ok(Self::Command),
            _ => Err(format!(
                "Unknown provider: '{}'. Valid options: free, openai, command",
                s
            )),
        }
    }
}

/// CLI values that override environment configuration.
#[derive(Debug, Clone, Default)]
pub struct LlmOverrides {
    pub provider: Option<LlmProvider>,
    pub model: Option<String>,
    pub fallback_model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub command: Option<String>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<usize>,
}

/// Configuration for generation providers.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    /// Model override; the provider default is used otherwise.
    pub model: Option<String>,
    /// Model tried once after the primary model is exhausted.
    pub fallback_model: Option<String>,
    /// Endpoint override for HTTP providers.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Command line for the `command` provider; `{model}` is substituted.
    pub command: Option<String>,
    pub timeout: Duration,
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: None,
            fallback_model: None,
            base_url: None,
            api_key: None,
            command: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl LlmConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables.
    ///
    /// The API key comes from `OPENAI_API_KEY`, or failing that from the file
    /// named by `GHOST_COMMENTER_API_KEY_FILE`.
    pub fn from_env() -> Self {
        let provider = env::var("GHOST_COMMENTER_PROVIDER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let api_key = non_empty_var("OPENAI_API_KEY").or_else(|| {
            let path = non_empty_var("GHOST_COMMENTER_API_KEY_FILE")?;
            match load_api_key_file(Path::new(&path)) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Could not read API key file {}: {}", path, e);
                    None
                }
            }
        });

        Self {
            provider,
            model: non_empty_var("GHOST_COMMENTER_MODEL"),
            fallback_model: non_empty_var("GHOST_COMMENTER_FALLBACK_MODEL"),
            base_url: non_empty_var("GHOST_COMMENTER_BASE_URL"),
            api_key,
            command: non_empty_var("GHOST_COMMENTER_COMMAND"),
            ..Self::default()
        }
    }

    /// Set the provider.
    pub fn with_provider(mut self, provider: LlmProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Merge with CLI overrides. CLI values take precedence.
    pub fn with_overrides(mut self, overrides: LlmOverrides) -> Self {
        if let Some(p) = overrides.provider {
            self.provider = p;
        }
        if let Some(m) = overrides.model {
            self.model = Some(m);
        }
        if let Some(m) = overrides.fallback_model {
            self.fallback_model = Some(m);
        }
        if let Some(u) = overrides.base_url {
            self.base_url = Some(u);
        }
        if let Some(k) = overrides.api_key {
            self.api_key = Some(k);
        }
        if let Some(c) = overrides.command {
            self.command = Some(c);
        }
        if let Some(t) = overrides.timeout {
            self.timeout = t;
        }
        if let Some(r) = overrides.max_retries {
            self.max_retries = r;
        }
        self
    }

    /// Model for the primary attempts.
    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Model for the single attempt made after the primary is exhausted.
    pub fn resolved_fallback_model(&self) -> Option<String> {
        self.fallback_model
            .clone()
            .or_else(|| self.provider.default_fallback_model().map(str::to_string))
    }

    /// Create a client for the configured provider.
    pub fn create_client(&self) -> Result<Box<dyn LlmClient>, LlmError> {
        match self.provider {
            LlmProvider::Free => Ok(Box::new(ChatCompletionsClient::new(
                self.base_url.as_deref().unwrap_or(FREE_BASE_URL),
            ))),
            LlmProvider::OpenAi => {
                let key = self
                    .api_key
                    .as_deref()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| {
                        LlmError::Unavailable("openai provider requires an API key".to_string())
                    })?;
                Ok(Box::new(
                    ChatCompletionsClient::new(
                        self.base_url.as_deref().unwrap_or(OPENAI_BASE_URL),
                    )
                    .with_api_key(key)
                    .with_temperature(0.9)
                    .with_max_tokens(150),
                ))
            }
            LlmProvider::Command => {
                let line = self.command.as_deref().ok_or_else(|| {
                    LlmError::Unavailable(
                        "command provider requires GHOST_COMMENTER_COMMAND or --provider-command"
                            .to_string(),
                    )
                })?;
                Ok(Box::new(CommandClient::parse(line)?))
            }
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read an API key from a file: the first non-empty line that is not a `#`
/// comment. A missing file yields `Ok(None)`.
pub fn load_api_key_file(path: &Path) -> io::Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string))
}

/// Trait for text-generation backends.
pub trait LlmClient: Send + Sync {
    /// Send a prompt and return the raw completion text.
    fn complete(&self, prompt: &str, timeout: Duration, model: &str) -> Result<String, LlmError>;
}

/// Errors from generation providers.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Generation failed after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: String },
}
