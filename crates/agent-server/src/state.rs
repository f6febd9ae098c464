//! Application State

use std::sync::Arc;

use agent_core::{MemorySessionStore, Orchestrator};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Tool-calling loop over the configured provider
    pub orchestrator: Arc<Orchestrator>,

    /// Session store (also held by the orchestrator)
    pub sessions: Arc<MemorySessionStore>,
}
