//! Accounts Tool
//!
//! Lists the customer's accounts with balances.

use std::sync::Arc;

use agent_core::{Tool, ToolCall, ToolContext, ToolDefinition, ToolExecutionResult};
use async_trait::async_trait;
use serde_json::json;

use super::{backend_failure, customer_id};
use crate::backend::BankingBackend;

/// Tool for listing accounts and balances
pub struct GetAccountsTool {
    backend: Arc<dyn BankingBackend>,
}

impl GetAccountsTool {
    pub fn new(backend: Arc<dyn BankingBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for GetAccountsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_accounts",
            "List the customer's bank accounts with IBAN, currency and current balance.",
            json!({ "type": "object", "properties": {} }),
        )
    }

    async fn execute(&self, _call: &ToolCall, ctx: &ToolContext) -> anyhow::Result<ToolExecutionResult> {
        let accounts = match self.backend.accounts(customer_id(ctx)).await {
            Ok(accounts) => accounts,
            Err(e) => return Ok(backend_failure("get_accounts", &e)),
        };

        if accounts.is_empty() {
            return Ok(ToolExecutionResult::success("The customer has no accounts."));
        }

        let lines: Vec<String> = accounts
            .iter()
            .map(|a| format!("{} [{}] {}: {:.2} {}", a.name, a.id, a.iban, a.balance, a.currency))
            .collect();

        Ok(ToolExecutionResult::success(format!("Accounts:\n{}", lines.join("\n")))
            .with_data(serde_json::to_value(&accounts)?))
    }
}
