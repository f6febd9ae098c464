//! # banking-tools
//!
//! Tool pack for a retail banking assistant.
//!
//! ## Tools
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────────┐
//! │ get_accounts     │ accounts, IBANs, balances                    │
//! │ get_transactions │ recent history of one account                │
//! │ find_recipient   │ saved recipient name -> IBAN                 │
//! │ transfer_money   │ two-phase: preview (isConfirmed=false),      │
//! │                  │ then commit (isConfirmed=true)               │
//! │ find_atm         │ ATMs by city / district                      │
//! └──────────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! A transfer to a person named by the user goes
//! `find_recipient -> transfer_money(preview) -> user confirms -> transfer_money(commit)`.

pub mod backend;
pub mod error;
pub mod model;
pub mod svckit;

use std::sync::Arc;

use agent_core::ToolRegistry;

pub use backend::{BankingBackend, MockBankingBackend};
pub use error::{BankingError, Result};
pub use model::{Account, Atm, Recipient, Transaction, TransferPreview, TransferReceipt, TransferRequest};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        FindAtmTool, FindRecipientTool, GetAccountsTool, GetTransactionsTool, TransferMoneyTool,
    };
}

/// Register every banking tool against one backend
pub fn register_banking_tools(registry: &mut ToolRegistry, backend: &Arc<dyn BankingBackend>) {
    registry.register(tools::GetAccountsTool::new(backend.clone()));
    registry.register(tools::GetTransactionsTool::new(backend.clone()));
    registry.register(tools::FindRecipientTool::new(backend.clone()));
    registry.register(tools::TransferMoneyTool::new(backend.clone()));
    registry.register(tools::FindAtmTool::new(backend.clone()));
    tracing::info!(backend = backend.name(), tools = registry.len(), "Banking tools registered");
}

/// System prompt for the banking assistant
pub const BANKING_ASSISTANT_PROMPT: &str = r"You are a helpful, careful retail banking assistant. You can look up the customer's accounts and transactions, find saved recipients, transfer money and locate ATMs.

## Transfers

1. If the user names a person instead of giving an IBAN, call `find_recipient` first. Never guess an IBAN.
2. If several recipients match, ask the user which one they mean.
3. Call `transfer_money` with `isConfirmed=false` to get a preview. Show the amount, recipient, fee and resulting balance.
4. Only after the user explicitly confirms, call `transfer_money` again with `isConfirmed=true` and exactly the same details.
5. If a tool reports a failure (insufficient funds, invalid IBAN), explain it plainly and suggest what the user can do.

## Style

- Be concise. Format amounts with two decimals and the currency code.
- Use tools for every fact about the customer's money; never invent balances or transactions.
- Do not reveal full account numbers unless the user asks for them.

## Tools Available

- `get_accounts` - Accounts and balances
- `get_transactions` - Recent transactions of an account
- `find_recipient` - Saved recipients by name
- `transfer_money` - Two-phase transfer (preview, then confirmed commit)
- `find_atm` - ATMs by city and district";
