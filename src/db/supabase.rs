// db/supabase.rs
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};

use super::gateway::{
    AuthChange, AuthEvent, AuthSession, AuthUser, Filter, GatewayError, Order, RemoteGateway,
};

/// PostgREST + GoTrue client for a hosted Supabase project.
#[derive(Debug)]
pub struct SupabaseGateway {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthChange>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)));

        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Escapes LIKE metacharacters so a search term matches as a plain substring.
/// PostgREST reads every `*` as `%`, so a literal `*` degrades to `_`.
fn like_literal(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        match c {
            '\\' | '%' | '_' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '*' => escaped.push('_'),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Renders filters and ordering as PostgREST query pairs.
pub fn query_pairs(filters: &[Filter], order: Option<&Order>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = filters
        .iter()
        .map(|filter| {
            let condition = match filter {
                Filter::Eq(_, Value::Null) | Filter::IsNull(_) => "is.null".to_string(),
                Filter::Eq(_, Value::String(value)) => format!("eq.{}", value),
                Filter::Eq(_, value) => format!("eq.{}", value),
                Filter::ILike(_, term) => format!("ilike.*{}*", like_literal(term)),
            };
            (filter.column().to_string(), condition)
        })
        .collect();

    if let Some(order) = order {
        let direction = if order.ascending { "asc" } else { "desc" };
        pairs.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    pairs
}

/// Provider error bodies put the human message under one of several keys.
fn error_message(body: &Value, fallback: &str) -> String {
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .unwrap_or(fallback)
        .to_string()
}

impl SupabaseGateway {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            session: RwLock::new(None),
            events,
        }
    }

    /// Reinstates a previously persisted session without raising a notification.
    pub async fn restore_session(&self, session: Option<AuthSession>) {
        *self.session.write().await = session;
    }

    fn rest_url(&self, table: &str, filters: &[Filter], order: Option<&Order>) -> Result<String, GatewayError> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let pairs = query_pairs(filters, order);
        if pairs.is_empty() {
            return Ok(url);
        }

        let query = serde_urlencoded::to_string(&pairs)
            .map_err(|e| GatewayError::rejected(format!("Unencodable filter: {}", e)))?;
        Ok(format!("{}?{}", url, query))
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    async fn bearer(&self) -> String {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
            .unwrap_or_else(|| self.api_key.clone())
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.api_key.as_str())
            .header("Authorization", format!("Bearer {}", self.bearer().await))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, GatewayError> {
        let response = self.authorized(request).await.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&body)?);
        }

        let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        tracing::warn!("Gateway request failed with {}: {}", status, body);
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            code: parsed.get("code").and_then(Value::as_str).map(str::to_string),
            message: error_message(&parsed, status.canonical_reason().unwrap_or("Request failed")),
        })
    }

    /// Auth endpoints report bad credentials as 4xx; those become [`GatewayError::Auth`].
    async fn send_auth(&self, request: RequestBuilder) -> Result<Value, GatewayError> {
        match self.send(request).await {
            Err(GatewayError::Rejected { status, message, .. })
                if matches!(status, 400 | 401 | 403 | 422) =>
            {
                Err(GatewayError::Auth(message))
            }
            other => other,
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, GatewayError> {
        let request = self
            .http
            .post(self.auth_url("token?grant_type=refresh_token"))
            .json(&json!({ "refresh_token": refresh_token }));
        let token: TokenResponse = serde_json::from_value(self.send_auth(request).await?)?;
        Ok(token.into_session())
    }

    fn emit(&self, event: AuthEvent, session: Option<AuthSession>) {
        // No subscribers is not an error.
        let _ = self.events.send(AuthChange { event, session });
    }
}

#[async_trait]
impl RemoteGateway for SupabaseGateway {
    async fn query(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
    ) -> Result<Vec<Value>, GatewayError> {
        let url = self.rest_url(table, filters, order.as_ref())?;
        let body = self.send(self.http.get(url)).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, GatewayError> {
        let url = self.rest_url(table, &[], None)?;
        let request = self
            .http
            .post(url)
            .header("Prefer", "return=representation")
            .json(&row);

        let rows: Vec<Value> = serde_json::from_value(self.send(request).await?)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| GatewayError::rejected(format!("Insert into {} returned no row", table)))
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, GatewayError> {
        let url = self.rest_url(table, filters, None)?;
        let request = self
            .http
            .patch(url)
            .header("Prefer", "return=representation")
            .json(&patch);
        Ok(serde_json::from_value(self.send(request).await?)?)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), GatewayError> {
        let url = self.rest_url(table, filters, None)?;
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    async fn call_procedure(&self, name: &str, args: Value) -> Result<Value, GatewayError> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, name);
        self.send(self.http.post(url).json(&args)).await
    }

    async fn get_session(&self) -> Result<Option<AuthSession>, GatewayError> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            self.restore_session(None).await;
            self.emit(AuthEvent::SignedOut, None);
            return Ok(None);
        };

        match self.refresh(refresh_token).await {
            Ok(refreshed) => {
                tracing::info!("Refreshed session for user {}", refreshed.user_id());
                self.restore_session(Some(refreshed.clone())).await;
                self.emit(AuthEvent::TokenRefreshed, Some(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(GatewayError::Auth(message)) => {
                tracing::warn!("Session refresh rejected: {}", message);
                self.restore_session(None).await;
                self.emit(AuthEvent::SignedOut, None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe_session_changes(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, GatewayError> {
        let request = self
            .http
            .post(self.auth_url("signup"))
            .json(&json!({ "email": email, "password": password }));
        let body = self.send_auth(request).await?;

        // Projects with email confirmation answer with the bare user.
        let user = match body.get("user") {
            Some(user) if user.is_object() => user.clone(),
            _ => body,
        };
        Ok(serde_json::from_value(user)?)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, GatewayError> {
        let request = self
            .http
            .post(self.auth_url("token?grant_type=password"))
            .json(&json!({ "email": email, "password": password }));
        let token: TokenResponse = serde_json::from_value(self.send_auth(request).await?)?;
        let session = token.into_session();

        self.restore_session(Some(session.clone())).await;
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        if self.session.read().await.is_some() {
            self.send_auth(self.http.post(self.auth_url("logout"))).await?;
        }

        self.restore_session(None).await;
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }
}
