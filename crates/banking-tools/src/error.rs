//! Error Types for Banking Tools

use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BankingError>;

#[derive(Error, Debug)]
pub enum BankingError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("Invalid IBAN: {0}")]
    InvalidIban(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Currency mismatch: account holds {account}, transfer is in {requested}")]
    CurrencyMismatch { account: String, requested: String },

    #[error("Transfer not previewed: {0}")]
    NotPreviewed(String),

    #[error("Backend unavailable: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BankingError {
    /// Business rejection the model should explain to the user, as opposed to
    /// an infrastructure fault
    pub const fn is_business_rule(&self) -> bool {
        !matches!(self, Self::Backend(_) | Self::Serialization(_))
    }
}
