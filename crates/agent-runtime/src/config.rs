//! Provider configuration

use agent_core::{AgentError, GenerationConfig, ProviderKind, Result};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Provider connection and generation settings
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Vendor family
    pub kind: ProviderKind,

    /// API key (Bearer token for OpenAI, `key` query parameter for Gemini)
    pub api_key: String,

    /// Override for OpenAI-compatible gateways or proxies
    pub base_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    pub generation: GenerationConfig,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            base_url: None,
            timeout_secs: 60,
            generation: GenerationConfig::for_model(default_model(kind)),
        }
    }

    /// Read configuration from the environment.
    ///
    /// `LLM_PROVIDER` selects the vendor (default `openai`); the key comes from
    /// `OPENAI_API_KEY` or `GEMINI_API_KEY` accordingly.
    pub fn from_env() -> Result<Self> {
        let kind: ProviderKind = std::env::var("LLM_PROVIDER")
            .unwrap_or_else(|_| "openai".into())
            .parse()?;

        let key_var = match kind {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        };
        let api_key = std::env::var(key_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config(format!("{key_var} is not set")))?;

        let mut config = Self::new(kind, api_key);
        config.base_url = std::env::var("LLM_BASE_URL").ok().filter(|u| !u.is_empty());

        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.generation.model = model;
        }
        if let Some(temperature) = env_parse("LLM_TEMPERATURE") {
            config.generation.temperature = temperature;
        }
        if let Some(max_tokens) = env_parse("LLM_MAX_TOKENS") {
            config.generation.max_tokens = max_tokens;
        }
        if let Some(timeout) = env_parse("LLM_TIMEOUT_SECS") {
            config.timeout_secs = timeout;
        }

        Ok(config)
    }

    /// Base URL with any trailing slash removed
    pub fn resolved_base_url(&self) -> String {
        let base = self.base_url.as_deref().unwrap_or(match self.kind {
            ProviderKind::OpenAi => OPENAI_BASE_URL,
            ProviderKind::Gemini => GEMINI_BASE_URL,
        });
        base.trim_end_matches('/').to_string()
    }
}

const fn default_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "gpt-4o-mini",
        ProviderKind::Gemini => "gemini-2.0-flash",
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    let value = std::env::var(var).ok()?;
    let parsed = value.parse().ok();
    if parsed.is_none() {
        tracing::warn!(var, value = %value, "Ignoring unparsable environment value");
    }
    parsed
}
