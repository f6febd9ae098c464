//! Mock Banking Backend
//!
//! For testing and demo purposes. One demo customer with static accounts,
//! recipients and ATMs; transfers update balances in memory.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;

use super::BankingBackend;
use crate::error::{BankingError, Result};
use crate::model::{
    Account, AccountType, Atm, Recipient, Transaction, TransactionKind, TransferPreview,
    TransferReceipt, TransferRequest,
};

/// Bank code of the demo bank (IBAN characters 5-9)
const OWN_BANK_CODE: &str = "00062";

const EXTERNAL_TRANSFER_FEE: Decimal = dec!(4.50);

struct Ledger {
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
}

/// Mock backend with static data
pub struct MockBankingBackend {
    ledger: RwLock<Ledger>,
    recipients: Vec<Recipient>,
    atms: Vec<Atm>,
}

impl Default for MockBankingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBankingBackend {
    pub fn new() -> Self {
        Self {
            ledger: RwLock::new(Ledger {
                accounts: demo_accounts(),
                transactions: demo_transactions(),
            }),
            recipients: demo_recipients(),
            atms: demo_atms(),
        }
    }

    fn fee_for(to_iban: &str) -> Decimal {
        if to_iban.get(4..9) == Some(OWN_BANK_CODE) {
            Decimal::ZERO
        } else {
            EXTERNAL_TRANSFER_FEE
        }
    }

    fn check(ledger: &Ledger, request: &TransferRequest) -> Result<TransferPreview> {
        let account = ledger
            .accounts
            .iter()
            .find(|a| a.id == request.from_account_id)
            .ok_or_else(|| BankingError::AccountNotFound(request.from_account_id.clone()))?;

        if account.currency != request.currency {
            return Err(BankingError::CurrencyMismatch {
                account: account.currency.clone(),
                requested: request.currency.clone(),
            });
        }
        if account.iban == request.to_iban {
            return Err(BankingError::InvalidIban(
                "source and destination are the same account".into(),
            ));
        }

        let fee = Self::fee_for(&request.to_iban);
        let needed = request.amount + fee;
        if needed > account.balance {
            return Err(BankingError::InsufficientFunds {
                needed,
                available: account.balance,
            });
        }

        Ok(TransferPreview {
            request: request.clone(),
            from_iban: account.iban.clone(),
            fee,
            balance_after: account.balance - needed,
        })
    }
}

#[async_trait]
impl BankingBackend for MockBankingBackend {
    async fn accounts(&self, _customer_id: &str) -> Result<Vec<Account>> {
        Ok(self.ledger.read().await.accounts.clone())
    }

    async fn transactions(&self, account_id: &str, limit: usize) -> Result<Vec<Transaction>> {
        let ledger = self.ledger.read().await;
        if !ledger.accounts.iter().any(|a| a.id == account_id) {
            return Err(BankingError::AccountNotFound(account_id.to_string()));
        }
        let mut transactions: Vec<Transaction> = ledger
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.date.cmp(&a.date));
        transactions.truncate(limit);
        Ok(transactions)
    }

    async fn recipients(&self, _customer_id: &str) -> Result<Vec<Recipient>> {
        Ok(self.recipients.clone())
    }

    async fn preview_transfer(&self, request: &TransferRequest) -> Result<TransferPreview> {
        Self::check(&*self.ledger.read().await, request)
    }

    async fn execute_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        let mut ledger = self.ledger.write().await;
        let preview = Self::check(&ledger, request)?;

        let account = ledger
            .accounts
            .iter_mut()
            .find(|a| a.id == request.from_account_id)
            .ok_or_else(|| BankingError::AccountNotFound(request.from_account_id.clone()))?;
        account.balance = preview.balance_after;
        let currency = account.currency.clone();

        let reference = format!("TX-{}", uuid::Uuid::new_v4().simple());
        let executed_at = Utc::now();
        let recipient = request.recipient_name.as_deref().unwrap_or(&request.to_iban);
        ledger.transactions.push(Transaction {
            id: reference.clone(),
            account_id: request.from_account_id.clone(),
            date: executed_at.date_naive(),
            description: format!("Transfer to {recipient}"),
            amount: -(request.amount + preview.fee),
            currency,
            kind: TransactionKind::Debit,
        });

        tracing::info!(
            reference = %reference,
            from = %request.from_account_id,
            amount = %request.amount,
            "Mock transfer executed"
        );

        Ok(TransferReceipt {
            reference,
            request: request.clone(),
            fee: preview.fee,
            new_balance: preview.balance_after,
            executed_at,
        })
    }

    async fn atms(&self, city: &str, district: Option<&str>) -> Result<Vec<Atm>> {
        let city = city.trim().to_lowercase();
        let district = district.map(|d| d.trim().to_lowercase());
        Ok(self
            .atms
            .iter()
            .filter(|a| a.city.to_lowercase() == city)
            .filter(|a| {
                district
                    .as_deref()
                    .is_none_or(|d| a.district.to_lowercase() == d)
            })
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "MockBank"
    }
}

fn demo_accounts() -> Vec<Account> {
    let account = |id: &str, iban: &str, name: &str, account_type, currency: &str, balance| Account {
        id: id.into(),
        iban: iban.into(),
        name: name.into(),
        account_type,
        currency: currency.into(),
        balance,
    };
    vec![
        account("acc-checking", "TR660006200012300006298001", "Main Account", AccountType::Checking, "TRY", dec!(12450.75)),
        account("acc-savings", "TR390006200012300006298002", "Savings", AccountType::Savings, "TRY", dec!(50000.00)),
        account("acc-usd", "TR590006700010000000555555", "USD Account", AccountType::Foreign, "USD", dec!(1200.00)),
    ]
}

fn demo_transactions() -> Vec<Transaction> {
    let tx = |id: &str, account: &str, (y, m, d), description: &str, amount: Decimal, currency: &str| Transaction {
        id: id.into(),
        account_id: account.into(),
        date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
        description: description.into(),
        amount,
        currency: currency.into(),
        kind: if amount.is_sign_negative() { TransactionKind::Debit } else { TransactionKind::Credit },
    };
    vec![
        tx("t-1001", "acc-checking", (2025, 1, 3), "Salary", dec!(42000.00), "TRY"),
        tx("t-1002", "acc-checking", (2025, 1, 5), "Rent", dec!(-18500.00), "TRY"),
        tx("t-1003", "acc-checking", (2025, 1, 8), "Grocery store", dec!(-1240.35), "TRY"),
        tx("t-1004", "acc-checking", (2025, 1, 11), "Electricity bill", dec!(-865.90), "TRY"),
        tx("t-1005", "acc-checking", (2025, 1, 14), "Card payment - restaurant", dec!(-640.00), "TRY"),
        tx("t-2001", "acc-savings", (2025, 1, 1), "Interest", dec!(1875.00), "TRY"),
        tx("t-3001", "acc-usd", (2024, 12, 20), "FX purchase", dec!(500.00), "USD"),
    ]
}

fn demo_recipients() -> Vec<Recipient> {
    let recipient = |name: &str, iban: &str, bank: &str| Recipient {
        name: name.into(),
        iban: iban.into(),
        bank: bank.into(),
    };
    vec![
        recipient("Ali Yilmaz", "TR330006100519786457841326", "Isbank"),
        recipient("Ali Vural", "TR290006400000112345678901", "Isbank"),
        recipient("Ayse Demir", "TR900001500158007300123456", "Vakifbank"),
        recipient("Mehmet Kaya", "TR660004600098700011223344", "Akbank"),
        recipient("Zeynep Arslan", "TR810006200098700004411223", "MockBank"),
    ]
}

fn demo_atms() -> Vec<Atm> {
    let atm = |id: &str, city: &str, district: &str, address: &str, open_24h, accepts_deposits| Atm {
        id: id.into(),
        city: city.into(),
        district: district.into(),
        address: address.into(),
        open_24h,
        accepts_deposits,
    };
    vec![
        atm("atm-ist-1", "Istanbul", "Kadikoy", "Bahariye Cd. No:12", true, true),
        atm("atm-ist-2", "Istanbul", "Besiktas", "Barbaros Blv. No:45", true, false),
        atm("atm-ist-3", "Istanbul", "Sisli", "Halaskargazi Cd. No:210", false, true),
        atm("atm-ank-1", "Ankara", "Cankaya", "Tunali Hilmi Cd. No:88", true, true),
        atm("atm-izm-1", "Izmir", "Konak", "Cumhuriyet Blv. No:5", true, false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: Decimal, to_iban: &str) -> TransferRequest {
        TransferRequest {
            from_account_id: "acc-checking".into(),
            to_iban: to_iban.into(),
            recipient_name: Some("Ali Yilmaz".into()),
            amount,
            currency: "TRY".into(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_preview_does_not_move_money() {
        let bank = MockBankingBackend::new();
        let preview = bank
            .preview_transfer(&request(dec!(100), "TR330006100519786457841326"))
            .await
            .unwrap();
        assert_eq!(preview.fee, EXTERNAL_TRANSFER_FEE);
        assert_eq!(preview.balance_after, dec!(12346.25));

        let accounts = bank.accounts("demo").await.unwrap();
        assert_eq!(accounts[0].balance, dec!(12450.75));
    }

    #[tokio::test]
    async fn test_execute_debits_and_records() {
        let bank = MockBankingBackend::new();
        let receipt = bank
            .execute_transfer(&request(dec!(450.75), "TR390006200012300006298002"))
            .await
            .unwrap();
        // Same bank, no fee
        assert_eq!(receipt.fee, Decimal::ZERO);
        assert_eq!(receipt.new_balance, dec!(12000.00));

        let recent = bank.transactions("acc-checking", 1).await.unwrap();
        assert_eq!(recent[0].id, receipt.reference);
        assert_eq!(recent[0].amount, dec!(-450.75));
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let bank = MockBankingBackend::new();
        let err = bank
            .preview_transfer(&request(dec!(20000), "TR330006100519786457841326"))
            .await
            .unwrap_err();
        assert!(matches!(err, BankingError::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn test_atm_lookup_is_case_insensitive() {
        let bank = MockBankingBackend::new();
        assert_eq!(bank.atms("istanbul", None).await.unwrap().len(), 3);
        assert_eq!(bank.atms("ISTANBUL", Some("kadikoy")).await.unwrap().len(), 1);
        assert!(bank.atms("Bursa", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let bank = MockBankingBackend::new();
        let result = bank.transactions("acc-nope", 5).await;
        assert!(matches!(result, Err(BankingError::AccountNotFound(_))));
    }
}
