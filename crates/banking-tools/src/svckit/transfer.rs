//! Money Transfer Tool
//!
//! Two-phase: `isConfirmed=false` validates and returns a preview,
//! `isConfirmed=true` commits. A commit is only accepted for a transfer the
//! same conversation previewed, with the same source, destination and amount.
//! Previews expire, and a session reset or expiry starts a new conversation,
//! so an old preview can never authorize a commit.

use std::collections::HashMap;
use std::sync::Arc;

use agent_core::{Tool, ToolArgs, ToolCall, ToolContext, ToolDefinition, ToolExecutionResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::Mutex;

use super::{backend_failure, customer_id, str_arg};
use crate::backend::BankingBackend;
use crate::error::{BankingError, Result};
use crate::model::{AccountType, TransferRequest, normalize_iban, parse_amount};

const DEFAULT_CURRENCY: &str = "TRY";
const PREVIEW_TTL_MINUTES: i64 = 15;
const MAX_PENDING: usize = 1_000;

/// A preview awaiting the user's confirmation
struct PendingTransfer {
    conversation_id: Option<String>,
    request: TransferRequest,
    previewed_at: DateTime<Utc>,
}

/// Tool for previewing and executing transfers
pub struct TransferMoneyTool {
    backend: Arc<dyn BankingBackend>,
    /// Last preview per session
    pending: Mutex<HashMap<String, PendingTransfer>>,
    preview_ttl: Duration,
}

impl TransferMoneyTool {
    pub fn new(backend: Arc<dyn BankingBackend>) -> Self {
        Self {
            backend,
            pending: Mutex::new(HashMap::new()),
            preview_ttl: Duration::minutes(PREVIEW_TTL_MINUTES),
        }
    }

    /// How long a preview can be confirmed
    #[must_use]
    pub const fn with_preview_ttl(mut self, ttl: Duration) -> Self {
        self.preview_ttl = ttl;
        self
    }

    async fn remember(&self, ctx: &ToolContext, request: TransferRequest) {
        let now = Utc::now();
        let mut pending = self.pending.lock().await;
        pending.retain(|_, p| now - p.previewed_at <= self.preview_ttl);
        if pending.len() >= MAX_PENDING && !pending.contains_key(&ctx.session_id) {
            let oldest = pending
                .iter()
                .min_by_key(|(_, p)| p.previewed_at)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                pending.remove(&oldest);
            }
        }
        pending.insert(
            ctx.session_id.clone(),
            PendingTransfer {
                conversation_id: ctx.conversation_id.clone(),
                request,
                previewed_at: now,
            },
        );
    }

    /// Consume the session's preview if it authorizes `request`
    async fn take_preview(&self, ctx: &ToolContext, request: &TransferRequest) -> bool {
        let mut pending = self.pending.lock().await;
        let Some(preview) = pending.get(&ctx.session_id) else {
            return false;
        };
        if preview.conversation_id != ctx.conversation_id
            || Utc::now() - preview.previewed_at > self.preview_ttl
        {
            pending.remove(&ctx.session_id);
            return false;
        }
        if !same_transfer(&preview.request, request) {
            return false;
        }
        pending.remove(&ctx.session_id);
        true
    }

    /// Build a validated request from the model's arguments
    async fn build_request(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<TransferRequest> {
        let to_iban = str_arg(args, "toIban")
            .ok_or_else(|| BankingError::InvalidIban("parameter 'toIban' is required".into()))
            .and_then(normalize_iban)?;
        let amount = args
            .get("amount")
            .ok_or_else(|| BankingError::InvalidAmount("parameter 'amount' is required".into()))
            .and_then(parse_amount)?;
        let currency = str_arg(args, "currency")
            .unwrap_or(DEFAULT_CURRENCY)
            .to_ascii_uppercase();

        let from_account_id = match str_arg(args, "fromAccountId") {
            Some(id) => id.to_string(),
            None => {
                let accounts = self.backend.accounts(customer_id(ctx)).await?;
                accounts
                    .iter()
                    .filter(|a| a.currency == currency)
                    .min_by_key(|a| a.account_type != AccountType::Checking)
                    .map(|a| a.id.clone())
                    .ok_or_else(|| BankingError::AccountNotFound(format!("no {currency} account")))?
            }
        };

        Ok(TransferRequest {
            from_account_id,
            to_iban,
            recipient_name: str_arg(args, "recipientName").map(String::from),
            amount,
            currency,
            description: str_arg(args, "description").map(String::from),
        })
    }

    async fn preview(&self, request: TransferRequest, ctx: &ToolContext) -> ToolExecutionResult {
        let preview = match self.backend.preview_transfer(&request).await {
            Ok(preview) => preview,
            Err(e) => return backend_failure("transfer_money", &e),
        };

        let to = request.recipient_name.as_deref().unwrap_or(&request.to_iban);
        let message = format!(
            "Transfer preview: {:.2} {} from {} to {} ({}). Fee: {:.2} {}. Balance after: {:.2} {}. \
             Ask the user to confirm before calling transfer_money again with isConfirmed=true.",
            request.amount,
            request.currency,
            preview.from_iban,
            to,
            request.to_iban,
            preview.fee,
            request.currency,
            preview.balance_after,
            request.currency,
        );

        self.remember(ctx, request).await;

        let data = match serde_json::to_value(&preview) {
            Ok(mut data) => {
                data["requiresConfirmation"] = json!(true);
                data
            }
            Err(e) => return backend_failure("transfer_money", &e.into()),
        };
        ToolExecutionResult::success(message).with_data(data)
    }

    async fn commit(&self, request: TransferRequest, ctx: &ToolContext) -> ToolExecutionResult {
        if !self.take_preview(ctx, &request).await {
            let e = BankingError::NotPreviewed(
                "call transfer_money with isConfirmed=false first and get the user's confirmation".into(),
            );
            return backend_failure("transfer_money", &e);
        }

        match self.backend.execute_transfer(&request).await {
            Ok(receipt) => {
                tracing::info!(
                    session_id = %ctx.session_id,
                    reference = %receipt.reference,
                    "Transfer committed"
                );
                let message = format!(
                    "Transfer completed. Reference {}. New balance: {:.2} {}.",
                    receipt.reference, receipt.new_balance, request.currency
                );
                match serde_json::to_value(&receipt) {
                    Ok(data) => ToolExecutionResult::success(message).with_data(data),
                    Err(_) => ToolExecutionResult::success(message),
                }
            }
            Err(e) => backend_failure("transfer_money", &e),
        }
    }
}

/// Same money movement; descriptive fields may differ
fn same_transfer(a: &TransferRequest, b: &TransferRequest) -> bool {
    a.from_account_id == b.from_account_id
        && a.to_iban == b.to_iban
        && a.amount == b.amount
        && a.currency == b.currency
}

#[async_trait]
impl Tool for TransferMoneyTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "transfer_money",
            "Transfer money to an IBAN. Always call first with isConfirmed=false to get a preview, \
             show it to the user, and only after the user explicitly confirms call again with \
             isConfirmed=true and the same details.",
            json!({
                "type": "object",
                "properties": {
                    "toIban": { "type": "string", "description": "Destination IBAN (use find_recipient to look it up by name)" },
                    "amount": { "type": "number", "description": "Amount to send, at most two decimals" },
                    "currency": { "type": "string", "description": "ISO currency code, default TRY" },
                    "fromAccountId": { "type": "string", "description": "Source account id; defaults to the main account in that currency" },
                    "recipientName": { "type": "string", "description": "Recipient's name, for the receipt" },
                    "description": { "type": "string", "description": "Transfer description" },
                    "isConfirmed": { "type": "boolean", "description": "false = preview only, true = execute (after user confirmation)" }
                },
                "required": ["toIban", "amount", "isConfirmed"]
            }),
        )
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> anyhow::Result<ToolExecutionResult> {
        let confirmed = call
            .args
            .get("isConfirmed")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        let request = match self.build_request(&call.args, ctx).await {
            Ok(request) => request,
            Err(e) => return Ok(backend_failure("transfer_money", &e)),
        };

        Ok(if confirmed {
            self.commit(request, ctx).await
        } else {
            self.preview(request, ctx).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBankingBackend;

    const ALI: &str = "TR330006100519786457841326";

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall::new("call_1", "transfer_money", args.as_object().cloned().unwrap_or_default())
    }

    fn setup() -> (TransferMoneyTool, Arc<MockBankingBackend>) {
        let backend = Arc::new(MockBankingBackend::new());
        (TransferMoneyTool::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn test_preview_then_commit() {
        let (tool, backend) = setup();
        let ctx = ToolContext::new("s1");

        let preview = tool
            .execute(&call(json!({"toIban": ALI, "amount": 100, "isConfirmed": false, "recipientName": "Ali Yilmaz"})), &ctx)
            .await
            .unwrap();
        assert!(preview.success);
        assert!(preview.message.starts_with("Transfer preview: 100.00 TRY"));
        assert_eq!(preview.data.unwrap()["requiresConfirmation"], true);
        assert_eq!(backend.accounts("s1").await.unwrap()[0].balance.to_string(), "12450.75");

        let done = tool
            .execute(&call(json!({"toIban": ALI, "amount": "100.00", "isConfirmed": true})), &ctx)
            .await
            .unwrap();
        assert!(done.success, "{}", done.message);
        assert!(done.message.contains("New balance: 12346.25 TRY"));

        // A preview is consumed by its commit
        let again = tool
            .execute(&call(json!({"toIban": ALI, "amount": 100, "isConfirmed": true})), &ctx)
            .await
            .unwrap();
        assert!(!again.success);
    }

    #[tokio::test]
    async fn test_commit_without_preview_is_refused() {
        let (tool, backend) = setup();
        let result = tool
            .execute(&call(json!({"toIban": ALI, "amount": 100, "isConfirmed": true})), &ToolContext::new("s1"))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.contains("not previewed"));
        assert_eq!(backend.accounts("s1").await.unwrap()[0].balance.to_string(), "12450.75");
    }

    #[tokio::test]
    async fn test_commit_must_match_preview() {
        let (tool, _) = setup();
        let ctx = ToolContext::new("s1");
        tool.execute(&call(json!({"toIban": ALI, "amount": 100, "isConfirmed": false})), &ctx)
            .await
            .unwrap();

        let changed = tool
            .execute(&call(json!({"toIban": ALI, "amount": 1000, "isConfirmed": true})), &ctx)
            .await
            .unwrap();
        assert!(!changed.success);

        // Another session cannot confirm it either
        let other = tool
            .execute(&call(json!({"toIban": ALI, "amount": 100, "isConfirmed": true})), &ToolContext::new("s2"))
            .await
            .unwrap();
        assert!(!other.success);
    }

    #[tokio::test]
    async fn test_preview_from_earlier_conversation_is_refused() {
        let (tool, backend) = setup();
        let before = ToolContext::new("s1").with_conversation("c1");
        tool.execute(&call(json!({"toIban": ALI, "amount": 100, "isConfirmed": false})), &before)
            .await
            .unwrap();

        let after = ToolContext::new("s1").with_conversation("c2");
        let result = tool
            .execute(&call(json!({"toIban": ALI, "amount": 100, "isConfirmed": true})), &after)
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(backend.accounts("s1").await.unwrap()[0].balance.to_string(), "12450.75");

        // The stale preview is gone, not waiting for the old conversation
        let back = tool
            .execute(&call(json!({"toIban": ALI, "amount": 100, "isConfirmed": true})), &before)
            .await
            .unwrap();
        assert!(!back.success);
    }

    #[tokio::test]
    async fn test_expired_preview_is_refused() {
        let backend = Arc::new(MockBankingBackend::new());
        let tool = TransferMoneyTool::new(backend).with_preview_ttl(Duration::milliseconds(20));
        let ctx = ToolContext::new("s1");
        tool.execute(&call(json!({"toIban": ALI, "amount": 100, "isConfirmed": false})), &ctx)
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let result = tool
            .execute(&call(json!({"toIban": ALI, "amount": 100, "isConfirmed": true})), &ctx)
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_pending_previews_are_bounded() {
        let (tool, _) = setup();
        for i in 0..=MAX_PENDING {
            let ctx = ToolContext::new(format!("s{i}"));
            let preview = tool
                .execute(&call(json!({"toIban": ALI, "amount": 1, "isConfirmed": false})), &ctx)
                .await
                .unwrap();
            assert!(preview.success);
        }
        let pending = tool.pending.lock().await;
        assert_eq!(pending.len(), MAX_PENDING);
        assert!(pending.contains_key(&format!("s{MAX_PENDING}")));
    }

    #[tokio::test]
    async fn test_business_failures_are_results() {
        let (tool, _) = setup();
        let ctx = ToolContext::new("s1");

        let bad_iban = tool
            .execute(&call(json!({"toIban": "TR000000", "amount": 10, "isConfirmed": false})), &ctx)
            .await
            .unwrap();
        assert!(!bad_iban.success);
        assert!(bad_iban.message.starts_with("Invalid IBAN"));

        let too_much = tool
            .execute(&call(json!({"toIban": ALI, "amount": 1_000_000, "isConfirmed": false})), &ctx)
            .await
            .unwrap();
        assert!(!too_much.success);
        assert!(too_much.message.starts_with("Insufficient funds"));
    }

    #[tokio::test]
    async fn test_currency_picks_matching_account() {
        let (tool, _) = setup();
        let preview = tool
            .execute(
                &call(json!({"toIban": ALI, "amount": 50, "currency": "usd", "isConfirmed": false})),
                &ToolContext::new("s1"),
            )
            .await
            .unwrap();
        assert!(preview.success, "{}", preview.message);
        assert_eq!(preview.data.unwrap()["request"]["fromAccountId"], "acc-usd");
    }
}
