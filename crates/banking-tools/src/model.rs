//! Domain Models
//!
//! Accounts, transactions, saved recipients, ATMs and transfers.
//! All money is `rust_decimal::Decimal`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BankingError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
    Foreign,
}

/// A customer account
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub iban: String,
    pub name: String,
    pub account_type: AccountType,

    /// ISO 4217 code
    pub currency: String,
    pub balance: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

/// A posted transaction. `amount` is signed: negative for debits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub kind: TransactionKind,
}

/// A saved transfer recipient
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub name: String,
    pub iban: String,
    pub bank: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Atm {
    pub id: String,
    pub city: String,
    pub district: String,
    pub address: String,
    pub open_24h: bool,
    pub accepts_deposits: bool,
}

/// Validated transfer instruction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_account_id: String,
    pub to_iban: String,
    pub recipient_name: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
}

/// What a transfer would do, shown to the user before committing
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPreview {
    pub request: TransferRequest,
    pub from_iban: String,
    pub fee: Decimal,
    pub balance_after: Decimal,
}

/// A committed transfer
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub reference: String,
    pub request: TransferRequest,
    pub fee: Decimal,
    pub new_balance: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Normalize and validate an IBAN (ISO 13616 mod-97 check).
///
/// Spaces are removed and letters upper-cased.
pub fn normalize_iban(raw: &str) -> Result<String> {
    let iban: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let invalid = || BankingError::InvalidIban(raw.trim().to_string());

    if !(15..=34).contains(&iban.len()) || !iban.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid());
    }
    let (country, rest) = iban.split_at(2);
    if !country.chars().all(|c| c.is_ascii_alphabetic())
        || !rest[..2].chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    // Move the first four characters to the end and reduce digit by digit
    let remainder = iban[4..]
        .chars()
        .chain(iban[..4].chars())
        .try_fold(0u32, |acc, c| {
            let value = c.to_digit(36)?;
            let acc = if value >= 10 { acc * 100 + value } else { acc * 10 + value };
            Some(acc % 97)
        })
        .ok_or_else(invalid)?;

    if remainder == 1 { Ok(iban) } else { Err(invalid()) }
}

/// Parse a positive money amount with at most two decimal places
pub fn parse_amount(value: &serde_json::Value) -> Result<Decimal> {
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().replace(',', ""),
        other => return Err(BankingError::InvalidAmount(other.to_string())),
    };
    let amount: Decimal = text
        .parse()
        .map_err(|_| BankingError::InvalidAmount(text.clone()))?;

    if amount <= Decimal::ZERO {
        return Err(BankingError::InvalidAmount(format!("{amount} must be positive")));
    }
    if amount.normalize().scale() > 2 {
        return Err(BankingError::InvalidAmount(format!(
            "{amount} has more than two decimal places"
        )));
    }
    Ok(amount.round_dp(2))
}
