use axum::{extract::State, Json};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::profile::ProfileRow;
use crate::profiles::{get_or_create_profile, update_profile, ProfileUpdate};
use crate::state::AppState;

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProfileRow>, AppError> {
    let profile = get_or_create_profile(&state.db, &user).await?;
    Ok(Json(profile))
}

/// PATCH /api/v1/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileRow>, AppError> {
    let profile = update_profile(&state.db, &user, &update).await?;
    Ok(Json(profile))
}
