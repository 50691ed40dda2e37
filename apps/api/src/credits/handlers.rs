use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::credits::ledger::list_transactions;
use crate::credits::packages::{CreditPackage, CREDIT_PACKAGES};
use crate::errors::AppError;
use crate::models::profile::CreditTransactionRow;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BalanceResponse {
    pub credits: i32,
}

/// GET /api/v1/credits
pub async fn handle_get_balance(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<BalanceResponse>, AppError> {
    let credits = state.ledger.balance(user.user_id).await?;
    Ok(Json(BalanceResponse { credits }))
}

/// GET /api/v1/credits/transactions
pub async fn handle_list_transactions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<CreditTransactionRow>>, AppError> {
    let rows = list_transactions(&state.db, user.user_id).await?;
    Ok(Json(rows))
}

/// GET /api/v1/credits/packages
pub async fn handle_list_packages() -> Json<&'static [CreditPackage]> {
    Json(CREDIT_PACKAGES)
}
