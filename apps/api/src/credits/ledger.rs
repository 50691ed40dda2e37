//! Credit balance mutations. Every change to `user_profiles.credits` goes
//! through a `CreditLedger` and writes a matching `credit_transactions` row in
//! the same database transaction.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::CreditTransactionRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Purchase,
    Usage,
    Refund,
    Bonus,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "purchase",
            TransactionKind::Usage => "usage",
            TransactionKind::Refund => "refund",
            TransactionKind::Bonus => "bonus",
        }
    }
}

/// A debit against the balance.
#[derive(Debug, Clone)]
pub struct Charge {
    pub credits: i32,
    pub description: String,
    pub service_used: Option<String>,
    pub reference_id: Option<String>,
}

/// A credit to the balance.
#[derive(Debug, Clone)]
pub struct Grant {
    pub kind: TransactionKind,
    pub credits: i32,
    pub description: String,
    pub reference_id: Option<String>,
}

#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Current balance; 0 for users without a profile.
    async fn balance(&self, user_id: Uuid) -> Result<i32, AppError>;

    /// Atomic conditional decrement. `Ok(false)` when the balance is too low,
    /// in which case nothing is written.
    async fn deduct(&self, user_id: Uuid, charge: &Charge) -> Result<bool, AppError>;

    /// Adds credits and returns the new balance.
    async fn add(&self, user_id: Uuid, grant: &Grant) -> Result<i32, AppError>;
}

#[derive(Clone)]
pub struct PgCreditLedger {
    pool: PgPool,
}

impl PgCreditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreditLedger for PgCreditLedger {
    async fn balance(&self, user_id: Uuid) -> Result<i32, AppError> {
        let credits: Option<i32> =
            sqlx::query_scalar("SELECT credits FROM user_profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(credits.unwrap_or(0))
    }

    async fn deduct(&self, user_id: Uuid, charge: &Charge) -> Result<bool, AppError> {
        if charge.credits <= 0 {
            return Err(AppError::Validation(
                "charge must be at least one credit".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        // Row lock + predicate: concurrent deductions serialize here and the
        // balance can never go negative.
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE user_profiles
            SET credits = credits - $2, updated_at = now()
            WHERE user_id = $1 AND credits >= $2
            RETURNING credits
            "#,
        )
        .bind(user_id)
        .bind(charge.credits)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(remaining) = remaining else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query(
            r#"
            INSERT INTO credit_transactions
                (user_id, transaction_type, credits, description, service_used, reference_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user_id)
        .bind(TransactionKind::Usage.as_str())
        .bind(-charge.credits)
        .bind(&charge.description)
        .bind(&charge.service_used)
        .bind(&charge.reference_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "Deducted {} credit(s) from user {user_id}; {remaining} remaining",
            charge.credits
        );
        Ok(true)
    }

    async fn add(&self, user_id: Uuid, grant: &Grant) -> Result<i32, AppError> {
        if grant.credits <= 0 {
            return Err(AppError::Validation(
                "grant must be at least one credit".to_string(),
            ));
        }

        let purchased = if grant.kind == TransactionKind::Purchase {
            grant.credits
        } else {
            0
        };

        let mut tx = self.pool.begin().await?;

        let balance: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE user_profiles
            SET credits = credits + $2,
                total_credits_purchased = total_credits_purchased + $3,
                updated_at = now()
            WHERE user_id = $1
            RETURNING credits
            "#,
        )
        .bind(user_id)
        .bind(grant.credits)
        .bind(purchased)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(balance) = balance else {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("Profile for user {user_id} not found")));
        };

        sqlx::query(
            r#"
            INSERT INTO credit_transactions
                (user_id, transaction_type, credits, description, reference_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(grant.kind.as_str())
        .bind(grant.credits)
        .bind(&grant.description)
        .bind(&grant.reference_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "Added {} credit(s) ({}) to user {user_id}; balance {balance}",
            grant.credits,
            grant.kind.as_str()
        );
        Ok(balance)
    }
}

pub async fn list_transactions(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<CreditTransactionRow>, AppError> {
    let rows = sqlx::query_as::<_, CreditTransactionRow>(
        "SELECT * FROM credit_transactions WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
