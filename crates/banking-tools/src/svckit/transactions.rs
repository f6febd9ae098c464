//! Transactions Tool
//!
//! Recent transaction history for one account.

use std::sync::Arc;

use agent_core::{Tool, ToolCall, ToolContext, ToolDefinition, ToolExecutionResult};
use async_trait::async_trait;
use serde_json::json;

use super::{backend_failure, customer_id, str_arg};
use crate::backend::BankingBackend;
use crate::model::AccountType;

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 20;

/// Tool for listing recent transactions
pub struct GetTransactionsTool {
    backend: Arc<dyn BankingBackend>,
}

impl GetTransactionsTool {
    pub fn new(backend: Arc<dyn BankingBackend>) -> Self {
        Self { backend }
    }

    /// Explicit account, or the customer's first checking account
    async fn resolve_account(&self, call: &ToolCall, ctx: &ToolContext) -> crate::Result<Option<String>> {
        if let Some(id) = str_arg(&call.args, "accountId") {
            return Ok(Some(id.to_string()));
        }
        let accounts = self.backend.accounts(customer_id(ctx)).await?;
        Ok(accounts
            .iter()
            .find(|a| a.account_type == AccountType::Checking)
            .or_else(|| accounts.first())
            .map(|a| a.id.clone()))
    }
}

#[async_trait]
impl Tool for GetTransactionsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_transactions",
            "Get the most recent transactions of an account, newest first.",
            json!({
                "type": "object",
                "properties": {
                    "accountId": {
                        "type": "string",
                        "description": "Account id from get_accounts. Defaults to the main checking account."
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Number of transactions (1-20, default 5)"
                    }
                }
            }),
        )
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> anyhow::Result<ToolExecutionResult> {
        let limit = call
            .args
            .get("limit")
            .and_then(serde_json::Value::as_u64)
            .map_or(DEFAULT_LIMIT, |l| usize::try_from(l).unwrap_or(MAX_LIMIT))
            .clamp(1, MAX_LIMIT);

        let account_id = match self.resolve_account(call, ctx).await {
            Ok(Some(id)) => id,
            Ok(None) => return Ok(ToolExecutionResult::failure("The customer has no accounts.")),
            Err(e) => return Ok(backend_failure("get_transactions", &e)),
        };

        let transactions = match self.backend.transactions(&account_id, limit).await {
            Ok(transactions) => transactions,
            Err(e) => return Ok(backend_failure("get_transactions", &e)),
        };

        if transactions.is_empty() {
            return Ok(ToolExecutionResult::success(format!(
                "No transactions on account {account_id}."
            )));
        }

        let lines: Vec<String> = transactions
            .iter()
            .map(|t| format!("{} {:<28} {:>+12.2} {}", t.date, t.description, t.amount, t.currency))
            .collect();

        Ok(ToolExecutionResult::success(format!(
            "Last {} transactions on {account_id}:\n{}",
            transactions.len(),
            lines.join("\n")
        ))
        .with_data(serde_json::to_value(&transactions)?))
    }
}
