use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DepositDto {
    #[validate(range(min = 500.0, max = 1000000.0, message = "Amount must be between ₦500 and ₦1,000,000"))]
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct BankDetails {
    #[validate(length(min = 1, message = "Account name is required"))]
    pub account_name: String,

    #[validate(length(equal = 10, message = "Account number must be 10 digits"))]
    pub account_number: String,

    #[validate(length(min = 1, message = "Bank code is required"))]
    pub bank_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WithdrawDto {
    #[validate(range(min = 1.0, message = "Amount must be at least ₦1"))]
    pub amount: f64,

    #[validate]
    pub bank_details: BankDetails,
}

/// Body of `POST /api/verify-payment`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, message = "Reference is required"))]
    pub reference: String,

    pub user_id: Uuid,

    #[validate(range(min = 1.0, message = "Amount must be at least ₦1"))]
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Returned to callers of a completed deposit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepositReceipt {
    pub reference: String,
    pub amount: f64,
    pub message: Option<String>,
}
