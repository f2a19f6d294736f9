// service/session_service.rs
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{broadcast::error::RecvError, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{
        gateway::{AuthChange, AuthEvent, AuthSession},
        userdb::ProfileExt,
        DBClient,
    },
    dtos::userdtos::{SignInDto, SignUpDto, UpdateProfileDto},
    models::usermodel::{NewProfile, Profile},
    service::{error::ServiceError, notification_service::NotificationService},
};

#[derive(Debug, Clone, Default)]
struct SessionState {
    session: Option<AuthSession>,
    user: Option<Profile>,
}

/// Owns "who is signed in" and the resolved profile for the lifetime of the
/// client. Shared through `Arc`; call [`SessionManager::start`] once.
pub struct SessionManager {
    db_client: Arc<DBClient>,
    notifications: NotificationService,
    state: RwLock<SessionState>,
    loaded: watch::Sender<bool>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("loading", &self.is_loading())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(db_client: Arc<DBClient>, notifications: NotificationService) -> Arc<Self> {
        let (loaded, _) = watch::channel(false);
        Arc::new(Self {
            db_client,
            notifications,
            state: RwLock::new(SessionState::default()),
            loaded,
            listener: Mutex::new(None),
        })
    }

    /// Subscribes to session changes, then resolves the startup session.
    /// Startup failures are logged and leave `user` empty.
    pub async fn start(self: &Arc<Self>) {
        let mut changes = self.db_client.gateway.subscribe_session_changes();
        let manager = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(manager) = manager.upgrade() else {
                            break;
                        };
                        manager.handle_auth_change(change).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Session listener skipped {} notifications", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Session listener stopped");
        });

        if let Some(previous) = self.listener.lock().await.replace(handle) {
            previous.abort();
        }

        match self.db_client.gateway.get_session().await {
            Ok(Some(session)) => {
                let user_id = session.user_id();
                self.state.write().await.session = Some(session);
                self.resolve_profile(user_id).await;
            }
            Ok(None) => tracing::debug!("No session at startup"),
            Err(e) => tracing::error!("Failed to fetch startup session: {}", e),
        }

        self.loaded.send_replace(true);
    }

    pub async fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
        }
    }

    pub async fn wait_until_loaded(&self) {
        let mut loaded = self.loaded.subscribe();
        // The sender lives as long as `self`, so this only ends once loaded.
        let _ = loaded.wait_for(|done| *done).await;
    }

    pub fn is_loading(&self) -> bool {
        !*self.loaded.borrow()
    }

    pub async fn user(&self) -> Option<Profile> {
        self.state.read().await.user.clone()
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.state.read().await.session.clone()
    }

    pub async fn current_user(&self) -> Result<Profile, ServiceError> {
        self.require_user("continue").await
    }

    pub(crate) async fn require_user(&self, action: &str) -> Result<Profile, ServiceError> {
        self.user()
            .await
            .ok_or_else(|| ServiceError::not_signed_in(action))
    }

    /// Applies a session-change notification. `SignedOut` clears the user
    /// before returning; `SignedIn` resolves the profile on a separate task,
    /// never inside the notification path.
    pub async fn handle_auth_change(self: &Arc<Self>, change: AuthChange) -> Option<JoinHandle<()>> {
        tracing::debug!("Auth change: {:?}", change.event);

        match change.event {
            AuthEvent::SignedOut => {
                let mut state = self.state.write().await;
                state.session = None;
                state.user = None;
                None
            }
            AuthEvent::SignedIn => {
                let session = change.session?;
                let user_id = session.user_id();
                self.state.write().await.session = Some(session);

                let manager = Arc::clone(self);
                Some(tokio::spawn(async move {
                    manager.resolve_profile(user_id).await;
                }))
            }
            AuthEvent::TokenRefreshed | AuthEvent::UserUpdated => {
                if let Some(session) = change.session {
                    self.state.write().await.session = Some(session);
                }
                None
            }
        }
    }

    /// Writes the profile only if `user_id` still owns the current session.
    async fn resolve_profile(&self, user_id: Uuid) {
        match self.db_client.get_profile(user_id).await {
            Ok(profile) => {
                let mut state = self.state.write().await;
                let current = state.session.as_ref().map(AuthSession::user_id);
                if current == Some(user_id) {
                    if profile.is_none() {
                        tracing::warn!("No profile row for user {}", user_id);
                    }
                    state.user = profile;
                } else {
                    tracing::debug!("Discarding stale profile resolution for {}", user_id);
                }
            }
            Err(e) => tracing::error!("Failed to resolve profile {}: {}", user_id, e),
        }
    }

    /// Re-reads the signed-in user's profile row, e.g. after a balance change.
    pub async fn refresh_profile(&self) -> Result<Option<Profile>, ServiceError> {
        let Some(user_id) = self.session().await.map(|s| s.user_id()) else {
            return Ok(None);
        };

        let profile = self.db_client.get_profile(user_id).await?;
        let mut state = self.state.write().await;
        if state.session.as_ref().map(AuthSession::user_id) == Some(user_id) {
            state.user = profile.clone();
        }
        Ok(profile)
    }

    /// Creates the auth identity and its zeroed profile. Does not sign in.
    pub async fn sign_up(&self, body: SignUpDto) -> Result<Profile, ServiceError> {
        body.validate()
            .map_err(|e| self.notifications.failure("Error", e.into()))?;

        let auth_user = self
            .db_client
            .gateway
            .sign_up(&body.email, &body.password)
            .await
            .map_err(|e| {
                self.notifications
                    .failure("Error", ServiceError::Validation(e.to_string()))
            })?;

        let new_profile = NewProfile::new(
            auth_user.id,
            body.email.clone(),
            body.first_name,
            body.last_name,
            body.phone_number,
            Utc::now(),
        );
        let profile = self
            .db_client
            .create_profile(new_profile)
            .await
            .map_err(|e| {
                self.notifications
                    .failure("Error", ServiceError::Validation(e.to_string()))
            })?;

        tracing::info!("Registered user {} ({})", profile.id, body.email);
        self.notifications.success(
            "Account created successfully",
            "Please verify your email to continue",
        );
        Ok(profile)
    }

    pub async fn sign_in(&self, body: SignInDto) -> Result<Profile, ServiceError> {
        body.validate()
            .map_err(|e| self.notifications.failure("Error", e.into()))?;

        let session = self
            .db_client
            .gateway
            .sign_in_with_password(&body.email, &body.password)
            .await
            .map_err(|e| self.notifications.failure("Error", ServiceError::Auth(e.to_string())))?;

        let user_id = session.user_id();
        let profile = self
            .db_client
            .get_profile(user_id)
            .await
            .map_err(|e| self.notifications.failure("Error", e.into()))?
            .ok_or_else(|| {
                self.notifications
                    .failure("Error", ServiceError::NotFound("User profile not found".into()))
            })?;

        {
            let mut state = self.state.write().await;
            state.session = Some(session);
            state.user = Some(profile.clone());
        }

        tracing::info!("User {} signed in", user_id);
        self.notifications.success("Welcome back", "Successfully signed in");
        Ok(profile)
    }

    /// On provider failure the local user is only cleared if the provider no
    /// longer reports a session. The failure is returned either way.
    pub async fn sign_out(&self) -> Result<(), ServiceError> {
        match self.db_client.gateway.sign_out().await {
            Ok(()) => {
                self.clear().await;
                self.notifications.info("Signed out", "Successfully signed out");
                Ok(())
            }
            Err(e) => {
                let session_gone = matches!(self.db_client.gateway.get_session().await, Ok(None));
                if session_gone {
                    self.clear().await;
                }
                tracing::warn!("Sign out failed (session gone: {}): {}", session_gone, e);
                Err(self.notifications.failure("Error", e.into()))
            }
        }
    }

    async fn clear(&self) {
        let mut state = self.state.write().await;
        state.session = None;
        state.user = None;
    }

    /// Partial update of the signed-in user's profile. Returns the re-read row.
    pub async fn update_profile(&self, body: UpdateProfileDto) -> Result<Profile, ServiceError> {
        let user_id = {
            let state = self.state.read().await;
            match (&state.user, &state.session) {
                (Some(user), Some(_)) => user.id,
                _ => {
                    return Err(self.notifications.failure(
                        "Authentication error",
                        ServiceError::Auth("No user logged in".into()),
                    ))
                }
            }
        };

        body.validate()
            .map_err(|e| self.notifications.failure("Error", e.into()))?;

        let mut patch = serde_json::to_value(&body)
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        if let Value::Object(fields) = &mut patch {
            fields.insert("updated_at".to_string(), json!(Utc::now()));
        }

        let updated = self
            .db_client
            .update_profile(user_id, patch)
            .await
            .map_err(|e| self.notifications.failure("Error", e.into()))?;
        if updated.is_none() {
            return Err(self
                .notifications
                .failure("Error", ServiceError::NotFound("User profile not found".into())));
        }

        let profile = self
            .db_client
            .get_profile(user_id)
            .await
            .map_err(|e| self.notifications.failure("Error", e.into()))?
            .ok_or_else(|| {
                self.notifications
                    .failure("Error", ServiceError::NotFound("User profile not found".into()))
            })?;

        self.state.write().await.user = Some(profile.clone());
        self.notifications
            .success("Profile updated", "Your profile has been successfully updated");
        Ok(profile)
    }
}
