pub mod handlers;
pub mod razorpay;

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::credits::ledger::{CreditLedger, Grant, TransactionKind};
use crate::credits::packages::CreditPackage;
use crate::errors::AppError;
use crate::models::payment::PaymentRow;
use crate::payments::razorpay::Order;

/// Razorpay caps receipts at 40 characters.
pub fn receipt_for(user_id: Uuid, unix_millis: i64) -> String {
    let short = user_id.simple().to_string();
    format!("rcpt_{}_{unix_millis}", &short[..8])
}

pub fn order_notes(user_id: Uuid, package: &CreditPackage) -> Value {
    json!({
        "user_id": user_id,
        "credits": package.credits,
        "package_id": package.id,
    })
}

pub fn new_receipt(user_id: Uuid) -> String {
    receipt_for(user_id, Utc::now().timestamp_millis())
}

pub async fn create_pending_payment(
    pool: &PgPool,
    user_id: Uuid,
    order: &Order,
    package: &CreditPackage,
) -> Result<PaymentRow, AppError> {
    let row = sqlx::query_as::<_, PaymentRow>(
        r#"
        INSERT INTO payments
            (user_id, razorpay_order_id, amount, currency, status, payment_type,
             credits_purchased, metadata)
        VALUES ($1, $2, $3, $4, 'pending', 'credits', $5, $6)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&order.id)
    .bind(order.amount)
    .bind(&order.currency)
    .bind(package.credits)
    .bind(json!({ "package_id": package.id, "receipt": order.receipt }))
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn list_payments(pool: &PgPool, user_id: Uuid) -> Result<Vec<PaymentRow>, AppError> {
    let rows = sqlx::query_as::<_, PaymentRow>(
        "SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn find_by_order(
    pool: &PgPool,
    user_id: Uuid,
    order_id: &str,
) -> Result<PaymentRow, AppError> {
    sqlx::query_as::<_, PaymentRow>(
        "SELECT * FROM payments WHERE razorpay_order_id = $1 AND user_id = $2",
    )
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Payment for order {order_id} not found")))
}

#[derive(Debug)]
pub struct Settlement {
    pub payment: PaymentRow,
    pub credits_added: i32,
    pub balance: i32,
}

/// Moves a verified payment from pending to completed and grants its credits.
/// Only the request that wins the status transition grants anything; repeats
/// return the completed row with `credits_added == 0`.
pub async fn settle_payment(
    pool: &PgPool,
    ledger: &dyn CreditLedger,
    user_id: Uuid,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<Settlement, AppError> {
    let claimed = sqlx::query_as::<_, PaymentRow>(
        r#"
        UPDATE payments
        SET status = 'completed',
            razorpay_payment_id = $3,
            razorpay_signature = $4,
            updated_at = now()
        WHERE razorpay_order_id = $1 AND user_id = $2 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(user_id)
    .bind(payment_id)
    .bind(signature)
    .fetch_optional(pool)
    .await?;

    let Some(payment) = claimed else {
        let existing = find_by_order(pool, user_id, order_id).await?;
        if existing.status == "completed" {
            info!("Payment for order {order_id} already settled");
            return Ok(Settlement {
                payment: existing,
                credits_added: 0,
                balance: ledger.balance(user_id).await?,
            });
        }
        return Err(AppError::Payment(format!(
            "Payment for order {order_id} is {}",
            existing.status
        )));
    };

    let grant = Grant {
        kind: TransactionKind::Purchase,
        credits: payment.credits_purchased,
        description: format!("Purchased {} credits", payment.credits_purchased),
        reference_id: Some(payment_id.to_string()),
    };

    let balance = match ledger.add(user_id, &grant).await {
        Ok(balance) => balance,
        Err(e) => {
            error!("Granting credits for order {order_id} failed, reopening payment: {e}");
            if let Err(revert) = sqlx::query(
                "UPDATE payments SET status = 'pending', updated_at = now() WHERE id = $1",
            )
            .bind(payment.id)
            .execute(pool)
            .await
            {
                error!("Could not reopen payment {}: {revert}", payment.id);
            }
            return Err(e);
        }
    };

    info!(
        "Payment {payment_id} settled: {} credits for user {user_id}",
        payment.credits_purchased
    );
    Ok(Settlement {
        credits_added: payment.credits_purchased,
        payment,
        balance,
    })
}

/// Records a checkout failure. Only pending payments move to failed.
pub async fn fail_payment(
    pool: &PgPool,
    user_id: Uuid,
    order_id: &str,
    details: Value,
) -> Result<PaymentRow, AppError> {
    let failed = sqlx::query_as::<_, PaymentRow>(
        r#"
        UPDATE payments
        SET status = 'failed',
            metadata = COALESCE(metadata, '{}'::jsonb) || jsonb_build_object('failure', $3::jsonb),
            updated_at = now()
        WHERE razorpay_order_id = $1 AND user_id = $2 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(user_id)
    .bind(details)
    .fetch_optional(pool)
    .await?;

    match failed {
        Some(row) => {
            warn!("Payment for order {order_id} failed");
            Ok(row)
        }
        None => find_by_order(pool, user_id, order_id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credits::packages::find_package;

    #[test]
    fn test_receipt_fits_razorpay_limit() {
        let receipt = receipt_for(Uuid::new_v4(), 1_717_000_000_123);
        assert!(receipt.starts_with("rcpt_"));
        assert!(receipt.len() <= 40);
    }

    #[test]
    fn test_order_notes_carry_package() {
        let pack = find_package("pack_25").unwrap();
        let notes = order_notes(Uuid::nil(), pack);
        assert_eq!(notes["credits"], 25);
        assert_eq!(notes["package_id"], "pack_25");
    }
}
