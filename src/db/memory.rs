// db/memory.rs
//! In-process gateway with the same table, procedure and auth surface as the
//! hosted one. Every procedure runs under the single state lock, so it is atomic.
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use super::gateway::{
    AuthChange, AuthEvent, AuthSession, AuthUser, Filter, GatewayError, Order, RemoteGateway,
};
use crate::models::walletmodels::TransactionType;

const SESSION_LIFETIME_MINUTES: i64 = 60;

#[derive(Debug, Clone)]
struct StoredUser {
    id: Uuid,
    password: String,
    email_confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    users: HashMap<String, StoredUser>,
    session: Option<AuthSession>,
    calls: Vec<String>,
    failures: HashSet<String>,
}

impl MemoryState {
    fn check(&self, key: &str) -> Result<(), GatewayError> {
        if self.failures.contains(key) {
            return Err(GatewayError::rejected(format!("Injected failure: {}", key)));
        }
        Ok(())
    }

    /// Logs the attempted write, then applies any injected failure for it.
    fn record(&mut self, key: String) -> Result<(), GatewayError> {
        self.calls.push(key.clone());
        self.check(&key)
    }

    fn table(&mut self, name: &str) -> &mut Vec<Value> {
        self.tables.entry(name.to_string()).or_default()
    }

    fn find_mut(&mut self, table: &str, id: &str) -> Option<&mut Value> {
        self.table(table)
            .iter_mut()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
    }

    fn insert_row(&mut self, table: &str, mut row: Value) -> Result<Value, GatewayError> {
        let object = row
            .as_object_mut()
            .ok_or_else(|| GatewayError::rejected("Row must be a JSON object"))?;
        object
            .entry("id")
            .or_insert_with(|| json!(Uuid::new_v4()));
        object
            .entry("created_at")
            .or_insert_with(|| json!(Utc::now()));

        self.table(table).push(row.clone());
        Ok(row)
    }

    fn adjust_task_count(&mut self, category_id: &Value, delta: i64) {
        let Some(category_id) = category_id.as_str() else {
            return;
        };
        if let Some(category) = self.find_mut("categories", category_id) {
            let current = category.get("task_count").and_then(Value::as_i64).unwrap_or(0);
            if let Some(object) = category.as_object_mut() {
                object.insert("task_count".to_string(), json!((current + delta).max(0)));
            }
        }
    }

    fn create_task(&mut self, args: Value) -> Result<Value, GatewayError> {
        let task = args
            .get("task")
            .cloned()
            .ok_or_else(|| GatewayError::rejected("create_task requires a task"))?;
        let row = self.insert_row("tasks", task)?;
        let category_id = row.get("category_id").cloned().unwrap_or(Value::Null);
        self.adjust_task_count(&category_id, 1);
        Ok(row)
    }

    fn delete_task(&mut self, args: Value) -> Result<Value, GatewayError> {
        let task_id = string_arg(&args, "task_id")?;
        let tasks = self.table("tasks");
        let Some(position) = tasks
            .iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(task_id.as_str()))
        else {
            return Ok(Value::Null);
        };

        let removed = tasks.remove(position);
        let category_id = removed.get("category_id").cloned().unwrap_or(Value::Null);
        self.adjust_task_count(&category_id, -1);
        Ok(removed)
    }

    fn reassign_task_category(&mut self, args: Value) -> Result<Value, GatewayError> {
        let task_id = string_arg(&args, "task_id")?;
        let next = args.get("category_id").cloned().unwrap_or(Value::Null);
        let Some(task) = self.find_mut("tasks", &task_id) else {
            return Ok(Value::Null);
        };

        let previous = task.get("category_id").cloned().unwrap_or(Value::Null);
        if previous == next {
            return Ok(task.clone());
        }
        if let Some(object) = task.as_object_mut() {
            object.insert("category_id".to_string(), next.clone());
            object.insert("updated_at".to_string(), json!(Utc::now()));
        }
        let row = task.clone();

        self.adjust_task_count(&previous, -1);
        self.adjust_task_count(&next, 1);
        Ok(row)
    }

    fn profile_balance(&mut self, user_id: &str) -> Result<f64, GatewayError> {
        self.find_mut("profiles", user_id)
            .and_then(|profile| profile.get("wallet_balance").and_then(Value::as_f64))
            .ok_or_else(|| GatewayError::rejected("Profile not found"))
    }

    fn set_balance(&mut self, user_id: &str, balance: f64) {
        if let Some(profile) = self.find_mut("profiles", user_id).and_then(Value::as_object_mut) {
            profile.insert("wallet_balance".to_string(), json!(balance));
            profile.insert("updated_at".to_string(), json!(Utc::now()));
        }
    }

    fn withdraw_funds(&mut self, args: Value) -> Result<Value, GatewayError> {
        let user_id = string_arg(&args, "user_id")?;
        let amount = amount_arg(&args)?;
        let reference = string_arg(&args, "reference")?;
        let balance = self.profile_balance(&user_id)?;

        if balance < amount {
            return Ok(json!({
                "success": false,
                "message": "Insufficient funds",
                "balance": balance,
                "transaction": null,
            }));
        }

        let remaining = balance - amount;
        self.set_balance(&user_id, remaining);
        let transaction = self.insert_row(
            "transactions",
            json!({
                "user_id": user_id,
                "amount": TransactionType::Withdrawal.signed_amount(amount),
                "type": TransactionType::Withdrawal,
                "status": "pending",
                "reference": reference,
                "task_id": null,
                "payment_method": args.get("payment_method").cloned().unwrap_or(json!("wallet")),
                "bank_details": args.get("bank_details").cloned().unwrap_or(Value::Null),
            }),
        )?;

        Ok(json!({
            "success": true,
            "message": "Withdrawal initiated",
            "balance": remaining,
            "transaction": transaction,
        }))
    }

    fn fund_wallet(&mut self, args: Value) -> Result<Value, GatewayError> {
        let user_id = string_arg(&args, "user_id")?;
        let amount = amount_arg(&args)?;
        let reference = string_arg(&args, "reference")?;
        let balance = self.profile_balance(&user_id)?;

        let seen = self.table("transactions").iter().any(|row| {
            row.get("reference").and_then(Value::as_str) == Some(reference.as_str())
        });
        if seen {
            return Ok(json!({
                "success": true,
                "message": "Payment already processed",
                "balance": balance,
                "duplicate": true,
            }));
        }

        let credited = balance + amount;
        self.set_balance(&user_id, credited);
        self.insert_row(
            "transactions",
            json!({
                "user_id": user_id,
                "amount": TransactionType::Deposit.signed_amount(amount),
                "type": TransactionType::Deposit,
                "status": "completed",
                "reference": reference,
                "task_id": null,
                "payment_method": "paystack",
            }),
        )?;

        Ok(json!({
            "success": true,
            "message": "Wallet funded successfully",
            "balance": credited,
            "duplicate": false,
        }))
    }
}

fn string_arg(args: &Value, key: &str) -> Result<String, GatewayError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::rejected(format!("Missing argument: {}", key)))
}

fn amount_arg(args: &Value) -> Result<f64, GatewayError> {
    match args.get("amount").and_then(Value::as_f64) {
        Some(amount) if amount > 0.0 => Ok(amount),
        _ => Err(GatewayError::rejected("Amount must be positive")),
    }
}

fn matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, expected) => row.get(column).unwrap_or(&Value::Null) == expected,
        Filter::IsNull(column) => row.get(column).map_or(true, Value::is_null),
        Filter::ILike(column, term) => row
            .get(column)
            .and_then(Value::as_str)
            .map(|value| value.to_lowercase().contains(&term.to_lowercase()))
            .unwrap_or(false),
    })
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (a.parse::<DateTime<Utc>>(), b.parse::<DateTime<Utc>>()) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        (Some(Value::Null) | None, _) => Ordering::Less,
        (_, Some(Value::Null) | None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// In-memory [`RemoteGateway`] with a write log and per-operation fault injection.
#[derive(Debug)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
    events: broadcast::Sender<AuthChange>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            state: Mutex::new(MemoryState::default()),
            events,
        }
    }

    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        self.state.lock().await.table(table).extend(rows);
    }

    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.state.lock().await.table(table).clone()
    }

    pub async fn row(&self, table: &str, id: Uuid) -> Option<Value> {
        self.state.lock().await.find_mut(table, &id.to_string()).cloned()
    }

    /// Every write attempted so far, e.g. `insert:tasks` or `rpc:fund_wallet`.
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    /// Makes the operation `key` fail until [`MemoryGateway::clear_failures`].
    pub async fn fail_on(&self, key: &str) {
        self.state.lock().await.failures.insert(key.to_string());
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    pub async fn confirm_email(&self, email: &str) {
        if let Some(user) = self.state.lock().await.users.get_mut(email) {
            user.email_confirmed_at = Some(Utc::now());
        }
    }

    /// Replaces the current session without raising a notification.
    pub async fn set_session(&self, session: Option<AuthSession>) {
        self.state.lock().await.session = session;
    }

    /// Raises a session-change notification; returns how many subscribers saw it.
    pub fn emit(&self, change: AuthChange) -> usize {
        self.events.send(change).unwrap_or(0)
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn query(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
    ) -> Result<Vec<Value>, GatewayError> {
        let mut state = self.state.lock().await;
        state.check(&format!("query:{}", table))?;

        let mut rows: Vec<Value> = state
            .table(table)
            .iter()
            .filter(|row| matches(row, filters))
            .cloned()
            .collect();

        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, GatewayError> {
        let mut state = self.state.lock().await;
        state.record(format!("insert:{}", table))?;
        state.insert_row(table, row)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, GatewayError> {
        let mut state = self.state.lock().await;
        state.record(format!("update:{}", table))?;

        let patch: Map<String, Value> = match patch {
            Value::Object(map) => map,
            _ => return Err(GatewayError::rejected("Patch must be a JSON object")),
        };

        let mut updated = Vec::new();
        for row in state.table(table).iter_mut().filter(|row| matches(row, filters)) {
            if let Some(object) = row.as_object_mut() {
                for (key, value) in &patch {
                    object.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        state.record(format!("delete:{}", table))?;
        state.table(table).retain(|row| !matches(row, filters));
        Ok(())
    }

    async fn call_procedure(&self, name: &str, args: Value) -> Result<Value, GatewayError> {
        let mut state = self.state.lock().await;
        state.record(format!("rpc:{}", name))?;

        match name {
            "create_task" => state.create_task(args),
            "delete_task" => state.delete_task(args),
            "reassign_task_category" => state.reassign_task_category(args),
            "withdraw_funds" => state.withdraw_funds(args),
            "fund_wallet" => state.fund_wallet(args),
            other => Err(GatewayError::Rejected {
                status: 404,
                code: Some("PGRST202".to_string()),
                message: format!("Could not find the function public.{}", other),
            }),
        }
    }

    async fn get_session(&self) -> Result<Option<AuthSession>, GatewayError> {
        let state = self.state.lock().await;
        state.check("auth:get_session")?;
        Ok(state.session.clone())
    }

    fn subscribe_session_changes(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, GatewayError> {
        let mut state = self.state.lock().await;
        state.record("auth:sign_up".to_string())?;

        if state.users.contains_key(email) {
            return Err(GatewayError::Auth("User already registered".to_string()));
        }

        let user = StoredUser {
            id: Uuid::new_v4(),
            password: password.to_string(),
            email_confirmed_at: None,
        };
        let id = user.id;
        state.users.insert(email.to_string(), user);

        Ok(AuthUser {
            id,
            email: Some(email.to_string()),
            email_confirmed_at: None,
        })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, GatewayError> {
        let session = {
            let mut state = self.state.lock().await;
            state.record("auth:sign_in".to_string())?;

            let user = match state.users.get(email) {
                Some(user) if user.password == password => user.clone(),
                _ => return Err(GatewayError::Auth("Invalid login credentials".to_string())),
            };
            if user.email_confirmed_at.is_none() {
                return Err(GatewayError::Auth("Email not confirmed".to_string()));
            }

            let session = AuthSession {
                access_token: Uuid::new_v4().to_string(),
                refresh_token: Some(Uuid::new_v4().to_string()),
                expires_at: Some(Utc::now() + Duration::minutes(SESSION_LIFETIME_MINUTES)),
                user: AuthUser {
                    id: user.id,
                    email: Some(email.to_string()),
                    email_confirmed_at: user.email_confirmed_at,
                },
            };
            state.session = Some(session.clone());
            session
        };

        self.emit(AuthChange {
            event: AuthEvent::SignedIn,
            session: Some(session.clone()),
        });
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        {
            let mut state = self.state.lock().await;
            state.record("auth:sign_out".to_string())?;
            state.session = None;
        }

        self.emit(AuthChange {
            event: AuthEvent::SignedOut,
            session: None,
        });
        Ok(())
    }
}
