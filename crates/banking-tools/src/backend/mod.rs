//! Core Banking Backend
//!
//! Abstraction over the bank's account, payment and branch services.

mod mock;

pub use mock::MockBankingBackend;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Account, Atm, Recipient, Transaction, TransferPreview, TransferReceipt, TransferRequest};

/// Banking backend trait (Strategy pattern)
///
/// Implement this over the real core-banking APIs; tools only see this trait.
#[async_trait]
pub trait BankingBackend: Send + Sync {
    /// Accounts owned by a customer
    async fn accounts(&self, customer_id: &str) -> Result<Vec<Account>>;

    /// Most recent transactions first
    async fn transactions(&self, account_id: &str, limit: usize) -> Result<Vec<Transaction>>;

    /// Saved recipients of a customer
    async fn recipients(&self, customer_id: &str) -> Result<Vec<Recipient>>;

    /// Validate a transfer without moving money
    async fn preview_transfer(&self, request: &TransferRequest) -> Result<TransferPreview>;

    /// Move the money
    async fn execute_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt>;

    /// ATMs in a city, optionally narrowed to a district
    async fn atms(&self, city: &str, district: Option<&str>) -> Result<Vec<Atm>>;

    /// Backend name
    fn name(&self) -> &str;
}
