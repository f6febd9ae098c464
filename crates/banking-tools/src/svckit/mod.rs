//! Service Kit - Agent Tools
//!
//! Banking tools that implement `agent_core::Tool` over a [`BankingBackend`].
//!
//! [`BankingBackend`]: crate::backend::BankingBackend

mod accounts;
mod atm;
mod recipients;
mod transactions;
mod transfer;

pub use accounts::GetAccountsTool;
pub use atm::FindAtmTool;
pub use recipients::FindRecipientTool;
pub use transactions::GetTransactionsTool;
pub use transfer::TransferMoneyTool;

use agent_core::{ToolArgs, ToolContext, ToolExecutionResult};

use crate::error::BankingError;

/// Non-empty string argument
fn str_arg<'a>(args: &'a ToolArgs, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Customer the request acts for; anonymous sessions act as themselves
fn customer_id(ctx: &ToolContext) -> &str {
    ctx.user_id.as_deref().unwrap_or(&ctx.session_id)
}

/// Backend errors go back to the model as failure results
fn backend_failure(tool: &str, error: &BankingError) -> ToolExecutionResult {
    if error.is_business_rule() {
        tracing::debug!(tool, error = %error, "Banking request rejected");
    } else {
        tracing::warn!(tool, error = %error, "Banking backend failed");
    }
    ToolExecutionResult::failure(error.to_string())
}
