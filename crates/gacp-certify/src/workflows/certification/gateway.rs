use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::domain::PaymentPhase;

type HmacSha256 = Hmac<Sha256>;

/// Port to the external payment provider.
///
/// `create_order` registers a payment order and hands back the redirect/QR
/// material for the applicant. `verify_signature` authenticates an inbound
/// webhook payload; a `false` return means the webhook must be rejected
/// without any mutation.
pub trait PaymentGateway: Send + Sync {
    fn create_order(&self, order: &OrderRequest) -> Result<GatewayOrder, GatewayError>;
    fn verify_signature(&self, payload: &WebhookPayload) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    pub external_order_id: String,
    pub amount: u32,
    pub redirect_url: String,
    pub notify_url: String,
}

/// Successful order registration returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub order_reference: String,
    pub payment_url: String,
    pub qr_code_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment gateway rejected the order: {0}")]
    Rejected(String),
    #[error("payment gateway unreachable: {0}")]
    Unreachable(String),
}

/// Inbound webhook callback reporting the outcome of a payment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub merchant_order_no: String,
    pub result: String,
    #[serde(default)]
    pub channel: Option<String>,
    pub signature: String,
}

impl WebhookPayload {
    pub fn is_success(&self) -> bool {
        self.result.eq_ignore_ascii_case("SUCCESS")
    }
}

/// Deterministic external order id: encodes phase, application number, and
/// a millisecond timestamp so retries of the same phase stay distinguishable.
pub fn external_order_id(
    phase: PaymentPhase,
    application_number: &str,
    at: DateTime<Utc>,
) -> String {
    format!(
        "PAY{}-{}-{}",
        phase.number(),
        application_number,
        at.timestamp_millis()
    )
}

/// HMAC-SHA256 signature over the canonical webhook fields. Both the demo
/// gateway and tests derive signatures from this so verification stays in
/// one place.
pub fn sign_payload(secret: &str, merchant_order_no: &str, result: &str, channel: Option<&str>) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(merchant_order_no.as_bytes());
    mac.update(b"|");
    mac.update(result.as_bytes());
    mac.update(b"|");
    if let Some(channel) = channel {
        mac.update(channel.as_bytes());
    }
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a payload against the shared secret using a freshly computed MAC.
pub fn payload_signature_valid(secret: &str, payload: &WebhookPayload) -> bool {
    let expected = sign_payload(
        secret,
        &payload.merchant_order_no,
        &payload.result,
        payload.channel.as_deref(),
    );
    expected == payload.signature
}
