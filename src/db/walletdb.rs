// db/walletdb.rs
use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use super::{
    gateway::{from_row, from_rows, Filter, GatewayError, Order},
    DBClient,
};
use crate::{
    dtos::walletdtos::BankDetails,
    models::walletmodels::{FundingOutcome, PaymentMethod, Transaction, WithdrawalOutcome},
};

pub const TRANSACTIONS_TABLE: &str = "transactions";

#[async_trait]
pub trait WalletExt {
    async fn get_transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>, GatewayError>;

    async fn get_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, GatewayError>;

    /// Atomic "decrement if sufficient": records the pending withdrawal and
    /// moves the balance in one procedure call.
    async fn withdraw_funds(
        &self,
        user_id: Uuid,
        amount: f64,
        reference: &str,
        bank_details: &BankDetails,
    ) -> Result<WithdrawalOutcome, GatewayError>;

    /// Records a completed deposit and credits the balance in one procedure
    /// call. Replaying a reference is a no-op reported as `duplicate`.
    async fn fund_wallet(
        &self,
        user_id: Uuid,
        amount: f64,
        reference: &str,
    ) -> Result<FundingOutcome, GatewayError>;
}

#[async_trait]
impl WalletExt for DBClient {
    async fn get_transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>, GatewayError> {
        let rows = self
            .gateway
            .query(
                TRANSACTIONS_TABLE,
                &[Filter::eq("user_id", user_id)],
                Some(Order::desc("created_at")),
            )
            .await?;
        from_rows(rows)
    }

    async fn get_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, GatewayError> {
        self.gateway
            .query(TRANSACTIONS_TABLE, &[Filter::eq("reference", reference)], None)
            .await?
            .into_iter()
            .next()
            .map(from_row)
            .transpose()
    }

    async fn withdraw_funds(
        &self,
        user_id: Uuid,
        amount: f64,
        reference: &str,
        bank_details: &BankDetails,
    ) -> Result<WithdrawalOutcome, GatewayError> {
        let args = json!({
            "user_id": user_id,
            "amount": amount,
            "reference": reference,
            "payment_method": PaymentMethod::Wallet,
            "bank_details": bank_details,
        });
        from_row(self.gateway.call_procedure("withdraw_funds", args).await?)
    }

    async fn fund_wallet(
        &self,
        user_id: Uuid,
        amount: f64,
        reference: &str,
    ) -> Result<FundingOutcome, GatewayError> {
        let args = json!({
            "user_id": user_id,
            "amount": amount,
            "reference": reference,
        });
        from_row(self.gateway.call_procedure("fund_wallet", args).await?)
    }
}
