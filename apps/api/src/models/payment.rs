use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_order_id: Option<String>,
    #[serde(skip_serializing)]
    pub razorpay_signature: Option<String>,
    /// Minor units (paise).
    pub amount: i64,
    pub currency: String,
    /// pending | completed | failed | refunded
    pub status: String,
    /// credits | subscription
    pub payment_type: String,
    pub credits_purchased: i32,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
