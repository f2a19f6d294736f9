pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handler;
pub mod models;
pub mod routes;
pub mod service;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use tokio::sync::mpsc;

use config::{Config, ServerConfig};
use db::{gateway::RemoteGateway, supabase::SupabaseGateway, DBClient};
use service::{
    category_service::CategoryService,
    notification_service::{NotificationService, Notifier},
    payment_provider::{HttpPaymentVerifier, PaystackCheckout, PaystackClient, PendingCheckout},
    session_service::SessionManager,
    task_service::TaskService,
    wallet_service::WalletService,
};

/// Shared state of the payment verification server.
#[derive(Debug, Clone)]
pub struct AppState {
    pub env: ServerConfig,
    pub db_client: Arc<DBClient>,
    pub paystack: PaystackClient,
}

/// Everything a view layer needs: one session, the entity services and the
/// queue of checkouts waiting to be shown.
#[derive(Debug)]
pub struct Marketplace {
    pub db_client: Arc<DBClient>,
    pub session: Arc<SessionManager>,
    pub tasks: TaskService,
    pub categories: CategoryService,
    pub wallet: WalletService,
}

impl Marketplace {
    pub async fn connect(
        config: &Config,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, mpsc::Receiver<PendingCheckout>) {
        let gateway = Arc::new(SupabaseGateway::new(
            &config.supabase_url,
            &config.supabase_anon_key,
        ));
        Self::with_gateway(gateway, config, notifier).await
    }

    /// Wires the services over any gateway and waits for the initial session
    /// resolution to finish.
    pub async fn with_gateway(
        gateway: Arc<dyn RemoteGateway>,
        config: &Config,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, mpsc::Receiver<PendingCheckout>) {
        let db_client = Arc::new(DBClient::new(gateway));
        let notifications = NotificationService::new(notifier);

        let session = SessionManager::new(db_client.clone(), notifications.clone());
        session.start().await;

        let (checkout, popups) = PaystackCheckout::new(config.paystack_public_key.clone());
        let verifier = HttpPaymentVerifier::new(&config.verify_payment_url);

        let marketplace = Marketplace {
            tasks: TaskService::new(db_client.clone(), session.clone(), notifications.clone()),
            categories: CategoryService::new(db_client.clone(), notifications.clone()),
            wallet: WalletService::new(
                db_client.clone(),
                session.clone(),
                notifications,
                Arc::new(checkout),
                Arc::new(verifier),
            ),
            db_client,
            session,
        };
        (marketplace, popups)
    }

    pub async fn shutdown(&self) {
        self.session.shutdown().await;
    }
}
