// Shared fixtures for unit tests.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    db::{gateway::RemoteGateway, memory::MemoryGateway, walletdb::WalletExt, DBClient},
    dtos::{
        userdtos::SignInDto,
        walletdtos::{VerifyPaymentRequest, VerifyPaymentResponse},
    },
    models::usermodel::Profile,
    service::{
        category_service::CategoryService,
        error::ServiceError,
        notification_service::{Notice, NoticeLevel, NotificationService, Notifier},
        payment_provider::{CheckoutProvider, CheckoutRequest, PaymentVerifier, PAYMENT_WINDOW_CLOSED},
        session_service::SessionManager,
        task_service::TaskService,
        wallet_service::WalletService,
    },
};

pub const TEST_PASSWORD: &str = "secret123";

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("hustlr=debug")
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn last_title(&self) -> Option<String> {
        self.notices().last().map(|n| n.title.clone())
    }

    pub fn last_level(&self) -> Option<NoticeLevel> {
        self.notices().last().map(|n| n.level)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}

/// In-memory backend with a started session manager.
pub struct TestContext {
    pub gateway: Arc<MemoryGateway>,
    pub db_client: Arc<DBClient>,
    pub recorder: Arc<RecordingNotifier>,
    pub notifications: NotificationService,
    pub session: Arc<SessionManager>,
}

impl TestContext {
    pub async fn new() -> Self {
        init_test_tracing();

        let gateway = Arc::new(MemoryGateway::new());
        let db_client = Arc::new(DBClient::new(gateway.clone()));
        let recorder = Arc::new(RecordingNotifier::default());
        let notifications = NotificationService::new(recorder.clone());
        let session = SessionManager::new(db_client.clone(), notifications.clone());
        session.start().await;

        Self {
            gateway,
            db_client,
            recorder,
            notifications,
            session,
        }
    }

    /// Confirmed auth user plus a profile row, not signed in.
    pub async fn register(&self, email: &str, wallet_balance: f64) -> Uuid {
        let user = self
            .gateway
            .sign_up(email, TEST_PASSWORD)
            .await
            .expect("sign up");
        self.gateway.confirm_email(email).await;
        self.gateway
            .seed(
                "profiles",
                vec![json!({
                    "id": user.id,
                    "email": email,
                    "first_name": "Ada",
                    "last_name": "Obi",
                    "phone_number": null,
                    "profile_image_url": null,
                    "bio": null,
                    "location": "Lagos",
                    "wallet_balance": wallet_balance,
                    "rating": 0.0,
                    "total_tasks_completed": 0,
                    "total_tasks_posted": 0,
                    "is_verified": false,
                    "created_at": "2026-01-01T00:00:00Z",
                    "updated_at": "2026-01-01T00:00:00Z",
                })],
            )
            .await;
        user.id
    }

    pub async fn sign_in(&self, email: &str) -> Profile {
        self.session
            .sign_in(SignInDto {
                email: email.to_string(),
                password: TEST_PASSWORD.to_string(),
            })
            .await
            .expect("sign in")
    }

    pub async fn seed_category(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.gateway
            .seed(
                "categories",
                vec![json!({
                    "id": id,
                    "name": name,
                    "slug": name.to_lowercase(),
                    "icon": "tag",
                    "task_count": 0,
                })],
            )
            .await;
        id
    }

    pub fn task_service(&self) -> TaskService {
        TaskService::new(
            self.db_client.clone(),
            self.session.clone(),
            self.notifications.clone(),
        )
    }

    pub fn category_service(&self) -> CategoryService {
        CategoryService::new(self.db_client.clone(), self.notifications.clone())
    }

    pub fn wallet_service(
        &self,
        checkout: Arc<dyn CheckoutProvider>,
        verifier: Arc<dyn PaymentVerifier>,
    ) -> WalletService {
        WalletService::new(
            self.db_client.clone(),
            self.session.clone(),
            self.notifications.clone(),
            checkout,
            verifier,
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub enum CheckoutScript {
    Pay,
    Close,
}

/// Checkout that answers immediately and remembers what it was asked.
#[derive(Debug)]
pub struct ScriptedCheckout {
    script: CheckoutScript,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl ScriptedCheckout {
    pub fn new(script: CheckoutScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CheckoutProvider for ScriptedCheckout {
    async fn open_checkout(&self, request: CheckoutRequest) -> Result<String, ServiceError> {
        let reference = request.reference.clone();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        match self.script {
            CheckoutScript::Pay => Ok(reference),
            CheckoutScript::Close => Err(ServiceError::Payment(PAYMENT_WINDOW_CLOSED.to_string())),
        }
    }
}

/// Verifier that either trusts the payment (optionally crediting through
/// `fund_wallet`) or rejects it with a fixed message.
pub struct StaticVerifier {
    credit: Option<Arc<DBClient>>,
    rejection: Option<String>,
}

impl StaticVerifier {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self { credit: None, rejection: None })
    }

    pub fn crediting(db_client: Arc<DBClient>) -> Arc<Self> {
        Arc::new(Self { credit: Some(db_client), rejection: None })
    }

    pub fn rejecting(message: &str) -> Arc<Self> {
        Arc::new(Self { credit: None, rejection: Some(message.to_string()) })
    }
}

#[async_trait]
impl PaymentVerifier for StaticVerifier {
    async fn verify(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ServiceError> {
        if let Some(message) = &self.rejection {
            return Ok(VerifyPaymentResponse {
                success: false,
                message: Some(message.clone()),
            });
        }
        if let Some(db_client) = &self.credit {
            db_client
                .fund_wallet(request.user_id, request.amount, &request.reference)
                .await?;
        }
        Ok(VerifyPaymentResponse {
            success: true,
            message: Some(format!("Verified at {}", Utc::now().to_rfc3339())),
        })
    }
}
