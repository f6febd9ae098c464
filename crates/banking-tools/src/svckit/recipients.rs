//! Recipient Lookup Tool
//!
//! Resolves a person's name to the IBANs saved for them.

use std::sync::Arc;

use agent_core::{Tool, ToolCall, ToolContext, ToolDefinition, ToolExecutionResult};
use async_trait::async_trait;
use serde_json::json;

use super::{backend_failure, customer_id, str_arg};
use crate::backend::BankingBackend;
use crate::model::Recipient;

/// Tool for finding saved recipients by name
pub struct FindRecipientTool {
    backend: Arc<dyn BankingBackend>,
}

impl FindRecipientTool {
    pub fn new(backend: Arc<dyn BankingBackend>) -> Self {
        Self { backend }
    }
}

/// Every word of the query must start a word of the recipient's name
fn matches_name(recipient: &Recipient, query: &str) -> bool {
    let name = recipient.name.to_lowercase();
    let words: Vec<&str> = name.split_whitespace().collect();
    query
        .to_lowercase()
        .split_whitespace()
        .all(|q| words.iter().any(|w| w.starts_with(q)))
}

#[async_trait]
impl Tool for FindRecipientTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "find_recipient",
            "Find saved transfer recipients by name and return their IBANs. \
             Use this before any transfer where the user names a person instead of giving an IBAN.",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Full or partial recipient name (e.g., 'Ali' or 'Ali Yilmaz')"
                    }
                },
                "required": ["name"]
            }),
        )
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> anyhow::Result<ToolExecutionResult> {
        let Some(query) = str_arg(&call.args, "name") else {
            return Ok(ToolExecutionResult::failure("Parameter 'name' is required."));
        };

        let recipients = match self.backend.recipients(customer_id(ctx)).await {
            Ok(recipients) => recipients,
            Err(e) => return Ok(backend_failure("find_recipient", &e)),
        };

        let found: Vec<&Recipient> = recipients.iter().filter(|r| matches_name(r, query)).collect();

        let message = match found.as_slice() {
            [] => format!(
                "No saved recipient matches '{query}'. Ask the user for the recipient's IBAN."
            ),
            [only] => format!("Found {} ({}): {}", only.name, only.bank, only.iban),
            many => {
                let lines: Vec<String> = many
                    .iter()
                    .map(|r| format!("- {} ({}): {}", r.name, r.bank, r.iban))
                    .collect();
                format!(
                    "{} recipients match '{query}'. Ask the user which one they mean:\n{}",
                    many.len(),
                    lines.join("\n")
                )
            }
        };

        Ok(ToolExecutionResult::success(message).with_data(json!({
            "matches": serde_json::to_value(&found)?,
            "ambiguous": found.len() > 1,
        })))
    }
}
