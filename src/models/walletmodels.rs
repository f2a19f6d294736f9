use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    TaskPayment,
    TaskEarning,
}

impl TransactionType {
    /// Debits carry a negative `amount` on the transaction row, credits a positive one.
    pub fn is_debit(&self) -> bool {
        matches!(self, TransactionType::Withdrawal | TransactionType::TaskPayment)
    }

    /// Applies the sign convention to an unsigned magnitude.
    pub fn signed_amount(&self, magnitude: f64) -> f64 {
        if self.is_debit() {
            -magnitude.abs()
        } else {
            magnitude.abs()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Paystack,
    Wallet,
}

/// Append-only ledger entry. `amount` is signed, see [`TransactionType::signed_amount`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub reference: String,
    pub task_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}

/// Result of the `withdraw_funds` procedure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WithdrawalOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub balance: f64,
    #[serde(default)]
    pub transaction: Option<Transaction>,
}

/// Result of the `fund_wallet` procedure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FundingOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub balance: f64,
    #[serde(default)]
    pub duplicate: bool,
}

fn random_suffix(len: usize) -> String {
    use rand::{distr::Alphanumeric, Rng};

    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

pub fn generate_payment_reference() -> String {
    format!("HUSTLR-{}-{}", Utc::now().timestamp_millis(), random_suffix(11))
}

pub fn generate_withdrawal_reference() -> String {
    format!("WITHDRAWAL-{}-{}", Utc::now().timestamp_millis(), random_suffix(8))
}
