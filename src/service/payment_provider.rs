// service/payment_provider.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::{
    dtos::walletdtos::{VerifyPaymentRequest, VerifyPaymentResponse},
    service::error::ServiceError,
};

pub const PAYMENT_WINDOW_CLOSED: &str = "Payment window closed";

/// One hosted checkout: amount in kobo, tagged with the payer's identity.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutRequest {
    pub email: String,
    pub amount_kobo: i64,
    pub reference: String,
    pub metadata: Value,
}

#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Suspends until the payer finishes. Resolves with the paid reference,
    /// fails with [`ServiceError::Payment`] when the window is closed.
    async fn open_checkout(&self, request: CheckoutRequest) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ServiceError>;
}

/// A checkout waiting on the view layer. Dropping it closes the window.
#[derive(Debug)]
pub struct PendingCheckout {
    pub request: CheckoutRequest,
    /// Options for Paystack's inline `setup()`
    pub setup: Value,
    responder: oneshot::Sender<Result<String, String>>,
}

impl PendingCheckout {
    pub fn complete(self, reference: impl Into<String>) {
        let _ = self.responder.send(Ok(reference.into()));
    }

    pub fn fail(self, message: impl Into<String>) {
        let _ = self.responder.send(Err(message.into()));
    }
}

/// Hands each checkout to whoever renders the Paystack popup.
#[derive(Debug, Clone)]
pub struct PaystackCheckout {
    public_key: Option<String>,
    sender: mpsc::Sender<PendingCheckout>,
}

impl PaystackCheckout {
    pub fn new(public_key: Option<String>) -> (Self, mpsc::Receiver<PendingCheckout>) {
        let (sender, receiver) = mpsc::channel(8);
        (Self { public_key, sender }, receiver)
    }

    fn setup_payload(public_key: &str, request: &CheckoutRequest) -> Value {
        json!({
            "key": public_key,
            "email": request.email,
            "amount": request.amount_kobo,
            "currency": "NGN",
            "ref": request.reference,
            "metadata": request.metadata,
        })
    }
}

#[async_trait]
impl CheckoutProvider for PaystackCheckout {
    async fn open_checkout(&self, request: CheckoutRequest) -> Result<String, ServiceError> {
        let public_key = self
            .public_key
            .as_deref()
            .ok_or_else(|| ServiceError::Payment("Payment is not configured".to_string()))?;

        let (responder, answer) = oneshot::channel();
        let pending = PendingCheckout {
            setup: Self::setup_payload(public_key, &request),
            request,
            responder,
        };

        self.sender
            .send(pending)
            .await
            .map_err(|_| ServiceError::Payment(PAYMENT_WINDOW_CLOSED.to_string()))?;

        match answer.await {
            Ok(Ok(reference)) => Ok(reference),
            Ok(Err(message)) => Err(ServiceError::Payment(message)),
            Err(_) => Err(ServiceError::Payment(PAYMENT_WINDOW_CLOSED.to_string())),
        }
    }
}

/// Posts `{reference, userId, amount}` to the verification endpoint.
#[derive(Debug, Clone)]
pub struct HttpPaymentVerifier {
    url: String,
    http: reqwest::Client,
}

impl HttpPaymentVerifier {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentVerifier for HttpPaymentVerifier {
    async fn verify(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ServiceError> {
        let response = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::Payment(format!("Failed to verify payment: {}", e)))?;

        let status = response.status();
        // Failing verifications still answer with `{success, message}`.
        match response.json::<VerifyPaymentResponse>().await {
            Ok(body) => Ok(body),
            Err(e) => {
                tracing::error!("Unreadable verification response ({}): {}", status, e);
                Err(ServiceError::Payment("Failed to verify payment".to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub status: String,
    /// Kobo
    pub amount: i64,
    pub reference: String,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl PaymentVerification {
    pub fn is_successful(&self) -> bool {
        self.status == "success"
    }

    /// `metadata.user_id`; Paystack sometimes returns metadata as a JSON string.
    pub fn metadata_user_id(&self) -> Option<Uuid> {
        let metadata = match self.metadata.as_ref()? {
            Value::String(raw) => serde_json::from_str(raw).ok()?,
            other => other.clone(),
        };
        metadata.get("user_id")?.as_str()?.parse().ok()
    }
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

/// Server-side Paystack API client. Holds the secret key.
#[derive(Debug, Clone)]
pub struct PaystackClient {
    secret_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl PaystackClient {
    pub fn new(secret_key: &str, base_url: &str) -> Self {
        Self {
            secret_key: secret_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn verify_transaction(&self, reference: &str) -> Result<PaymentVerification, ServiceError> {
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.secret_key))
            .send()
            .await
            .map_err(|e| ServiceError::Payment(format!("Paystack unreachable: {}", e)))?;

        let body: PaystackEnvelope<PaymentVerification> = response
            .json()
            .await
            .map_err(|e| ServiceError::Payment(format!("Unexpected Paystack response: {}", e)))?;

        match body.data {
            Some(verification) if body.status => Ok(verification),
            _ => Err(ServiceError::Payment(body.message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            email: "ada@hustlr.ng".into(),
            amount_kobo: 50_000,
            reference: "HUSTLR-1-abc".into(),
            metadata: json!({ "user_id": Uuid::nil() }),
        }
    }

    #[tokio::test]
    async fn test_checkout_resolves_with_reference() {
        let (checkout, mut popups) = PaystackCheckout::new(Some("pk_test_1".into()));
        tokio::spawn(async move {
            let pending = popups.recv().await.unwrap();
            assert_eq!(pending.setup["key"], "pk_test_1");
            assert_eq!(pending.setup["amount"], 50_000);
            let reference = pending.request.reference.clone();
            pending.complete(reference);
        });

        assert_eq!(checkout.open_checkout(request()).await.unwrap(), "HUSTLR-1-abc");
    }

    #[tokio::test]
    async fn test_dropped_checkout_is_window_closed() {
        let (checkout, mut popups) = PaystackCheckout::new(Some("pk_test_1".into()));
        tokio::spawn(async move {
            drop(popups.recv().await);
        });

        let err = checkout.open_checkout(request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Payment(ref m) if m == PAYMENT_WINDOW_CLOSED));
    }

    #[tokio::test]
    async fn test_missing_public_key_fails_without_popup() {
        let (checkout, mut popups) = PaystackCheckout::new(None);

        assert!(matches!(
            checkout.open_checkout(request()).await,
            Err(ServiceError::Payment(_))
        ));
        assert!(popups.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_verifier_reads_failure_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/verify-payment"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "success": false,
                "message": "Payment amount mismatch"
            })))
            .mount(&server)
            .await;

        let verifier = HttpPaymentVerifier::new(&format!("{}/api/verify-payment", server.uri()));
        let response = verifier
            .verify(&VerifyPaymentRequest {
                reference: "HUSTLR-1-abc".into(),
                user_id: Uuid::new_v4(),
                amount: 500.0,
            })
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("Payment amount mismatch"));
    }

    #[tokio::test]
    async fn test_paystack_verify_transaction() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/transaction/verify/HUSTLR-1-abc"))
            .and(header("Authorization", "Bearer sk_test_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": true,
                "message": "Verification successful",
                "data": {
                    "status": "success",
                    "amount": 50000,
                    "reference": "HUSTLR-1-abc",
                    "channel": "card",
                    "paid_at": "2026-10-16T09:00:00.000Z",
                    "metadata": { "user_id": user_id }
                }
            })))
            .mount(&server)
            .await;

        let client = PaystackClient::new("sk_test_1", &server.uri());
        let verification = client.verify_transaction("HUSTLR-1-abc").await.unwrap();

        assert!(verification.is_successful());
        assert_eq!(verification.amount, 50_000);
        assert_eq!(verification.metadata_user_id(), Some(user_id));
    }

    #[tokio::test]
    async fn test_paystack_unknown_reference() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transaction/verify/nope"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": false,
                "message": "Transaction reference not found"
            })))
            .mount(&server)
            .await;

        let err = PaystackClient::new("sk_test_1", &server.uri())
            .verify_transaction("nope")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Payment(ref m) if m == "Transaction reference not found"));
    }

    #[test]
    fn test_string_metadata_is_parsed() {
        let user_id = Uuid::new_v4();
        let verification = PaymentVerification {
            status: "success".into(),
            amount: 100,
            reference: "r".into(),
            paid_at: None,
            channel: None,
            metadata: Some(Value::String(json!({ "user_id": user_id }).to_string())),
        };
        assert_eq!(verification.metadata_user_id(), Some(user_id));
    }
}
