//! # agent-core
//!
//! Vendor-neutral conversation orchestration: message model, history
//! adapters, tool registry, session store and the tool-calling loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────┐  │
//! │  │  Tool-call  │  │    Tool     │  │   LlmProvider        │  │
//! │  │    Loop     │──│  Registry   │──│   + HistoryAdapter   │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────────┘  │
//! │          │                                                   │
//! │  ┌───────▼──────────────────────┐                            │
//! │  │  SessionStore (native turns) │                            │
//! │  └──────────────────────────────┘                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sessions keep the transcript in the active vendor's own shape
//! ([`NativeHistory`]); the agnostic [`Message`] form is only used at
//! boundaries. Swapping vendors means picking another `LlmProvider`.

pub mod error;
pub mod history;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod session;
pub mod tool;

pub use error::{AgentError, Result};
pub use history::{HistoryAdapter, NativeHistory, history_adapter, history_adapter_for};
pub use message::{Message, Role, ToolArgs, ToolCall, ToolResponse};
pub use orchestrator::{ChatOutcome, Orchestrator, OrchestratorBuilder, OrchestratorConfig, ToolInvocation};
pub use provider::{
    GenerationConfig, GenerationOverrides, LlmProvider, LlmResponse, ProviderKind, RawResponse,
    TokenUsage, parse_tool_arguments,
};
pub use session::{MemorySessionStore, Session, SessionId, SessionStore, SessionStoreConfig, SessionSummary};
pub use tool::{Tool, ToolContext, ToolDefinition, ToolExecutionResult, ToolRegistry};
