use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::{info, warn};

use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

const ORDERS_URL: &str = "https://api.razorpay.com/v1/orders";

#[derive(Debug, Error)]
pub enum RazorpayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Razorpay error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid payment signature")]
    InvalidSignature,
}

impl From<RazorpayError> for AppError {
    fn from(e: RazorpayError) -> Self {
        match e {
            RazorpayError::InvalidSignature => {
                AppError::Payment("Invalid payment signature".to_string())
            }
            other => AppError::Payment(format!("Order creation failed: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    /// Paise.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    description: String,
}

#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: String,
    orders_url: String,
}

impl RazorpayClient {
    pub fn new(key_id: String, key_secret: String) -> Result<Self, RazorpayError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            key_id,
            key_secret,
            orders_url: ORDERS_URL.to_string(),
        })
    }

    /// Public key handed to the checkout widget.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub async fn create_order(&self, req: &OrderRequest) -> Result<Order, RazorpayError> {
        let response = self
            .client
            .post(&self.orders_url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Razorpay order creation returned {status}: {body}");
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.description)
                .unwrap_or(body);
            return Err(RazorpayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let order: Order = response.json().await?;
        info!("Created Razorpay order {} for {} {}", order.id, order.amount, order.currency);
        Ok(order)
    }

    /// Checks the checkout callback signature: hex HMAC-SHA256 of
    /// `order_id|payment_id` keyed with the account secret. Constant time.
    pub fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), RazorpayError> {
        let expected = hex::decode(signature.trim()).map_err(|_| RazorpayError::InvalidSignature)?;
        let mut mac = HmacSha256::new_from_slice(self.key_secret.as_bytes())
            .map_err(|_| RazorpayError::InvalidSignature)?;
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| RazorpayError::InvalidSignature)
    }
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RazorpayClient {
        RazorpayClient::new("rzp_test_key".to_string(), "rzp_test_secret".to_string()).unwrap()
    }

    #[test]
    fn test_valid_signature_passes() {
        let sig = sign("rzp_test_secret", "order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f");
        assert!(client()
            .verify_signature("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f", &sig)
            .is_ok());
    }

    #[test]
    fn test_signature_bound_to_ids_and_secret() {
        let sig = sign("rzp_test_secret", "order_A", "pay_B");
        assert!(client().verify_signature("order_A", "pay_C", &sig).is_err());
        assert!(client().verify_signature("order_X", "pay_B", &sig).is_err());

        let forged = sign("another_secret", "order_A", "pay_B");
        assert!(client().verify_signature("order_A", "pay_B", &forged).is_err());
    }

    #[test]
    fn test_malformed_signature_is_rejected() {
        assert!(matches!(
            client().verify_signature("order_A", "pay_B", "not-hex"),
            Err(RazorpayError::InvalidSignature)
        ));
        assert!(client().verify_signature("order_A", "pay_B", "").is_err());
    }

    #[test]
    fn test_invalid_signature_maps_to_payment_error() {
        let err: AppError = RazorpayError::InvalidSignature.into();
        assert!(matches!(err, AppError::Payment(m) if m == "Invalid payment signature"));
    }
}
