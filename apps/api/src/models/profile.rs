use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    /// free | premium | enterprise
    pub subscription_status: String,
    pub credits: i32,
    pub total_credits_purchased: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditTransactionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    /// purchase | usage | refund | bonus
    pub transaction_type: String,
    /// Signed: usage rows are negative.
    pub credits: i32,
    pub description: String,
    pub service_used: Option<String>,
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
