use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::{db::gateway::GatewayError, error::HttpError, models::taskmodel::TaskStatus};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Gateway(String),

    #[error("{0}")]
    Payment(String),

    #[error("Task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Task {0} was modified by someone else, reload and try again")]
    Conflict(Uuid),

    #[error("Insufficient funds in your wallet: requested {requested}, available {available}")]
    InsufficientFunds { requested: f64, available: f64 },
}

impl ServiceError {
    pub fn not_signed_in(action: &str) -> Self {
        ServiceError::Auth(format!("You must be logged in to {}", action))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Auth(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Validation(_) | ServiceError::InvalidTransition { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Payment(_) | ServiceError::InsufficientFunds { .. } => {
                StatusCode::PAYMENT_REQUIRED
            }
            ServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<GatewayError> for ServiceError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Auth(message) => ServiceError::Auth(message),
            other => ServiceError::Gateway(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(validation_message(&errors))
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let status = error.status_code();
        HttpError::new(error.to_string(), status)
    }
}

/// Flattens field errors into one sentence, first message per field.
fn validation_message(errors: &validator::ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    let messages: Vec<String> = fields
        .into_iter()
        .filter_map(|(field, errs)| {
            errs.first().map(|e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{} is invalid", field),
            })
        })
        .collect();

    if messages.is_empty() {
        "Invalid input".to_string()
    } else {
        messages.join("; ")
    }
}
