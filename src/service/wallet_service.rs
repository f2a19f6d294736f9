// service/wallet_service.rs
use std::sync::Arc;

use serde_json::json;
use validator::Validate;

use crate::{
    db::{
        cache::{keys, TRANSACTION_CACHE_TTL},
        walletdb::WalletExt,
        DBClient,
    },
    dtos::walletdtos::{DepositDto, DepositReceipt, VerifyPaymentRequest, WithdrawDto},
    models::walletmodels::{generate_payment_reference, generate_withdrawal_reference, Transaction},
    service::{
        error::ServiceError,
        notification_service::NotificationService,
        payment_provider::{CheckoutProvider, CheckoutRequest, PaymentVerifier},
        session_service::SessionManager,
    },
    utils::currency::{format_naira, naira_to_kobo},
};

pub struct WalletService {
    db_client: Arc<DBClient>,
    session: Arc<SessionManager>,
    notifications: NotificationService,
    checkout: Arc<dyn CheckoutProvider>,
    verifier: Arc<dyn PaymentVerifier>,
}

impl std::fmt::Debug for WalletService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletService").finish_non_exhaustive()
    }
}

impl WalletService {
    pub fn new(
        db_client: Arc<DBClient>,
        session: Arc<SessionManager>,
        notifications: NotificationService,
        checkout: Arc<dyn CheckoutProvider>,
        verifier: Arc<dyn PaymentVerifier>,
    ) -> Self {
        Self {
            db_client,
            session,
            notifications,
            checkout,
            verifier,
        }
    }

    /// The signed-in user's last-known `wallet_balance`, 0 when signed out.
    pub async fn balance(&self) -> f64 {
        self.session
            .user()
            .await
            .map(|user| user.wallet_balance)
            .unwrap_or(0.0)
    }

    /// Newest first; empty when signed out.
    pub async fn transactions(&self) -> Result<Vec<Transaction>, ServiceError> {
        let Some(user) = self.session.user().await else {
            return Ok(Vec::new());
        };

        let key = keys::transactions(user.id);
        if let Some(transactions) = self.db_client.cache.get::<Vec<Transaction>>(&key).await {
            return Ok(transactions);
        }

        let transactions = self
            .db_client
            .get_transactions(user.id)
            .await
            .map_err(|e| self.notifications.failure("Error", e.into()))?;
        self.db_client
            .cache
            .set(&key, &transactions, TRANSACTION_CACHE_TTL)
            .await;
        Ok(transactions)
    }

    /// Runs the hosted checkout, then has the verification endpoint credit
    /// the wallet. Nothing is credited from here.
    pub async fn deposit(&self, body: DepositDto) -> Result<DepositReceipt, ServiceError> {
        let user = self
            .session
            .require_user("make a deposit")
            .await
            .map_err(|e| self.notifications.failure("Authentication error", e))?;

        body.validate()
            .map_err(|e| self.notifications.failure("Error", e.into()))?;

        let request = CheckoutRequest {
            email: user.email.clone(),
            amount_kobo: naira_to_kobo(body.amount),
            reference: generate_payment_reference(),
            metadata: json!({
                "user_id": user.id,
                "custom_fields": [{
                    "display_name": "Platform",
                    "variable_name": "platform",
                    "value": "Hustlrs",
                }],
            }),
        };

        tracing::info!("Opening checkout {} for user {}", request.reference, user.id);
        let reference = self
            .checkout
            .open_checkout(request)
            .await
            .map_err(|e| self.notifications.failure("Payment failed", e))?;

        let verification = self
            .verifier
            .verify(&VerifyPaymentRequest {
                reference: reference.clone(),
                user_id: user.id,
                amount: body.amount,
            })
            .await
            .map_err(|e| self.notifications.failure("Payment failed", e))?;

        if !verification.success {
            let message = verification
                .message
                .unwrap_or_else(|| "Failed to process payment".to_string());
            tracing::warn!("Deposit {} was not verified: {}", reference, message);
            return Err(self
                .notifications
                .failure("Payment failed", ServiceError::Payment(message)));
        }

        self.db_client.invalidate("wallet.deposit", Some(user.id)).await;
        if let Err(e) = self.session.refresh_profile().await {
            tracing::warn!("Balance refresh after deposit failed: {}", e);
        }

        self.notifications.success(
            "Deposit successful",
            format!("{} has been added to your wallet", format_naira(body.amount)),
        );
        Ok(DepositReceipt {
            reference,
            amount: body.amount,
            message: verification.message,
        })
    }

    /// One `withdraw_funds` call; the procedure decides against the stored
    /// balance. The local balance check only spares a doomed round trip.
    pub async fn withdraw(&self, body: WithdrawDto) -> Result<Transaction, ServiceError> {
        let user = self
            .session
            .require_user("withdraw funds")
            .await
            .map_err(|e| self.notifications.failure("Authentication error", e))?;

        body.validate()
            .map_err(|e| self.notifications.failure("Error", e.into()))?;

        if body.amount > user.wallet_balance {
            return Err(self.notifications.failure(
                "Withdrawal failed",
                ServiceError::InsufficientFunds {
                    requested: body.amount,
                    available: user.wallet_balance,
                },
            ));
        }

        let reference = generate_withdrawal_reference();
        let outcome = self
            .db_client
            .withdraw_funds(user.id, body.amount, &reference, &body.bank_details)
            .await
            .map_err(|e| self.notifications.failure("Withdrawal failed", e.into()))?;

        let transaction = match (outcome.success, outcome.transaction) {
            (true, Some(transaction)) => transaction,
            (true, None) => {
                return Err(self.notifications.failure(
                    "Withdrawal failed",
                    ServiceError::Gateway("Withdrawal was not recorded".to_string()),
                ))
            }
            (false, _) => {
                return Err(self.notifications.failure(
                    "Withdrawal failed",
                    ServiceError::InsufficientFunds {
                        requested: body.amount,
                        available: outcome.balance,
                    },
                ))
            }
        };

        self.db_client.invalidate("wallet.withdraw", Some(user.id)).await;
        if let Err(e) = self.session.refresh_profile().await {
            tracing::warn!("Balance refresh after withdrawal failed: {}", e);
        }

        tracing::info!("Withdrawal {} of {} for user {}", reference, body.amount, user.id);
        self.notifications.success(
            "Withdrawal initiated",
            format!("{} is on its way to your bank account", format_naira(body.amount)),
        );
        Ok(transaction)
    }
}
