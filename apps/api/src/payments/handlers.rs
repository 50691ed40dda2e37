use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::credits::packages::{find_package, CreditPackage};
use crate::errors::AppError;
use crate::models::payment::PaymentRow;
use crate::payments::razorpay::OrderRequest;
use crate::payments::{
    create_pending_payment, fail_payment, list_payments, new_receipt, order_notes,
    settle_payment,
};
use crate::state::AppState;

const CHECKOUT_NAME: &str = "CareerLeap";

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub package_id: String,
}

#[derive(Serialize)]
pub struct CheckoutPrefill {
    pub name: Option<String>,
    pub email: String,
}

/// Everything the browser checkout widget needs to open.
#[derive(Serialize)]
pub struct CheckoutResponse {
    pub key: String,
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub name: &'static str,
    pub description: String,
    pub package: CreditPackage,
    pub payment_id: Uuid,
    pub prefill: CheckoutPrefill,
}

#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Serialize)]
pub struct VerifyPaymentResponse {
    pub verified: bool,
    pub credits_added: i32,
    pub credits: i32,
    pub payment: PaymentRow,
}

#[derive(Deserialize)]
pub struct PaymentFailedRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

/// GET /api/v1/payments
pub async fn handle_list_payments(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<PaymentRow>>, AppError> {
    let rows = list_payments(&state.db, user.user_id).await?;
    Ok(Json(rows))
}

/// POST /api/v1/payments/orders
pub async fn handle_create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let package = find_package(&req.package_id)
        .ok_or_else(|| AppError::Validation(format!("Unknown package: {}", req.package_id)))?;

    let order = state
        .razorpay
        .create_order(&OrderRequest {
            amount: package.amount_paise(),
            currency: package.currency.to_string(),
            receipt: new_receipt(user.user_id),
            notes: order_notes(user.user_id, package),
        })
        .await?;

    let payment = create_pending_payment(&state.db, user.user_id, &order, package).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            key: state.razorpay.key_id().to_string(),
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            name: CHECKOUT_NAME,
            description: format!("{} credits", package.credits),
            package: *package,
            payment_id: payment.id,
            prefill: CheckoutPrefill {
                name: user.full_name,
                email: user.email,
            },
        }),
    ))
}

/// POST /api/v1/payments/verify
pub async fn handle_verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    state.razorpay.verify_signature(
        &req.razorpay_order_id,
        &req.razorpay_payment_id,
        &req.razorpay_signature,
    )?;

    let settlement = settle_payment(
        &state.db,
        state.ledger.as_ref(),
        user.user_id,
        &req.razorpay_order_id,
        &req.razorpay_payment_id,
        &req.razorpay_signature,
    )
    .await?;

    Ok(Json(VerifyPaymentResponse {
        verified: true,
        credits_added: settlement.credits_added,
        credits: settlement.balance,
        payment: settlement.payment,
    }))
}

/// POST /api/v1/payments/failed
pub async fn handle_payment_failed(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PaymentFailedRequest>,
) -> Result<Json<PaymentRow>, AppError> {
    let details = json!({
        "razorpay_payment_id": req.razorpay_payment_id,
        "code": req.error_code,
        "description": req.error_description,
    });
    let row = fail_payment(&state.db, user.user_id, &req.razorpay_order_id, details).await?;
    Ok(Json(row))
}
