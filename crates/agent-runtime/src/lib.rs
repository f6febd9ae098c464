//! # agent-runtime
//!
//! HTTP provider adapters for agent-core.
//!
//! ## Providers
//!
//! - **OpenAI** (default): chat completions, or any compatible gateway via `LLM_BASE_URL`
//! - **Gemini**: Google `generateContent`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{ProviderConfig, create_provider};
//!
//! let provider = create_provider(&ProviderConfig::from_env()?)?;
//! let orchestrator = OrchestratorBuilder::new()
//!     .provider(provider)
//!     .sessions(store)
//!     .build()?;
//! ```

pub mod config;
pub mod gemini;
mod http;
pub mod openai;

use std::sync::Arc;

pub use config::ProviderConfig;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

// Re-export core types for convenience
pub use agent_core::{AgentError, LlmProvider, ProviderKind, Result};

/// Build the provider for the configured vendor
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    tracing::info!(
        provider = %config.kind,
        model = %config.generation.model,
        base_url = %config.resolved_base_url(),
        "Creating LLM provider"
    );
    let provider: Arc<dyn LlmProvider> = match config.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(config)?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_config(config)?),
    };
    Ok(provider)
}
