use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use validator::Validate;

use crate::{
    db::walletdb::WalletExt,
    dtos::walletdtos::{VerifyPaymentRequest, VerifyPaymentResponse},
    error::HttpError,
    service::error::ServiceError,
    utils::currency::{format_naira, kobo_to_naira, naira_to_kobo},
    AppState,
};

pub fn payment_handler() -> Router {
    Router::new()
        .route("/verify-payment", post(verify_payment))
        .route("/healthchecker", get(health_checker))
}

pub async fn health_checker() -> impl IntoResponse {
    Json(json!({
        "status": "success",
        "message": "Payment verification service is running"
    }))
}

/// Confirms a Paystack reference and credits the payer's wallet once.
pub async fn verify_payment(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    let existing = app_state
        .db_client
        .get_transaction_by_reference(&body.reference)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    if let Some(existing) = existing {
        if existing.user_id != body.user_id {
            tracing::warn!(
                "Reference {} belongs to {}, replayed by {}",
                body.reference,
                existing.user_id,
                body.user_id
            );
            return Err(HttpError::bad_request("Payment does not belong to this user"));
        }
        tracing::info!("Payment {} was already processed", body.reference);
        return Ok(Json(VerifyPaymentResponse {
            success: true,
            message: Some("Payment already processed".to_string()),
        }));
    }

    let verification = app_state
        .paystack
        .verify_transaction(&body.reference)
        .await
        .map_err(|e| {
            tracing::warn!("Paystack verification of {} failed: {}", body.reference, e);
            HttpError::from(e)
        })?;

    if !verification.is_successful() {
        return Err(HttpError::payment_required(format!(
            "Payment was not successful: {}",
            verification.status
        )));
    }

    if verification.amount != naira_to_kobo(body.amount) {
        tracing::warn!(
            "Amount mismatch on {}: paid {}, claimed {}",
            body.reference,
            format_naira(kobo_to_naira(verification.amount)),
            format_naira(body.amount)
        );
        return Err(HttpError::bad_request("Payment amount mismatch"));
    }

    if let Some(owner) = verification.metadata_user_id() {
        if owner != body.user_id {
            tracing::warn!("Payment {} belongs to {}, not {}", body.reference, owner, body.user_id);
            return Err(HttpError::bad_request("Payment does not belong to this user"));
        }
    }

    let outcome = app_state
        .db_client
        .fund_wallet(body.user_id, body.amount, &body.reference)
        .await
        .map_err(|e| {
            tracing::error!("fund_wallet failed for {}: {}", body.reference, e);
            HttpError::from(ServiceError::from(e))
        })?;

    if !outcome.success {
        return Err(HttpError::server_error(
            outcome
                .message
                .unwrap_or_else(|| "Failed to process payment".to_string()),
        ));
    }

    tracing::info!(
        "Credited {} to {} (balance {}, duplicate {})",
        body.amount,
        body.user_id,
        outcome.balance,
        outcome.duplicate
    );

    Ok(Json(VerifyPaymentResponse {
        success: true,
        message: outcome
            .message
            .or_else(|| Some("Payment verified successfully".to_string())),
    }))
}
