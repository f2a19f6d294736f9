// db/gateway.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The provider refused the request; `message` is passed through verbatim.
    #[error("{message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("{0}")]
    Auth(String),

    #[error("Gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed gateway response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GatewayError {
    pub fn rejected(message: impl Into<String>) -> Self {
        GatewayError::Rejected {
            status: 400,
            code: None,
            message: message.into(),
        }
    }
}

/// Row predicate understood by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    IsNull(String),
    /// Case-insensitive substring match
    ILike(String, String),
}

impl Filter {
    pub fn eq(column: &str, value: impl Serialize) -> Self {
        Filter::Eq(
            column.to_string(),
            serde_json::to_value(value).unwrap_or(Value::Null),
        )
    }

    pub fn ilike(column: &str, term: &str) -> Self {
        Filter::ILike(column.to_string(), term.to_string())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::IsNull(c) | Filter::ILike(c, _) => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self { column: column.to_string(), ascending: true }
    }

    pub fn desc(column: &str) -> Self {
        Self { column: column.to_string(), ascending: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}

impl AuthSession {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Session-change notification raised by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<AuthSession>,
}

/// Hosted table storage, auth and stored procedures.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn query(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
    ) -> Result<Vec<Value>, GatewayError>;

    async fn get_by_id(&self, table: &str, id: Uuid) -> Result<Option<Value>, GatewayError> {
        let rows = self.query(table, &[Filter::eq("id", id)], None).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, GatewayError>;

    /// Returns the patched rows; empty when no row matched every filter.
    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, GatewayError>;

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), GatewayError>;

    async fn call_procedure(&self, name: &str, args: Value) -> Result<Value, GatewayError>;

    async fn get_session(&self) -> Result<Option<AuthSession>, GatewayError>;

    /// Dropping the receiver unsubscribes.
    fn subscribe_session_changes(&self) -> broadcast::Receiver<AuthChange>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, GatewayError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, GatewayError>;

    async fn sign_out(&self) -> Result<(), GatewayError>;
}

pub fn from_row<T: serde::de::DeserializeOwned>(row: Value) -> Result<T, GatewayError> {
    Ok(serde_json::from_value(row)?)
}

pub fn from_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, GatewayError> {
    rows.into_iter().map(from_row).collect()
}
