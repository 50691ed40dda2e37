pub mod handlers;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::credits::ledger::TransactionKind;
use crate::errors::AppError;
use crate::models::profile::ProfileRow;

pub const STARTING_CREDITS: i32 = 5;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    /// Blank strings mean "leave as is".
    fn normalized(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        fn clean(v: &Option<String>) -> Option<&str> {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }
        (clean(&self.full_name), clean(&self.phone), clean(&self.avatar_url))
    }

    pub fn is_empty(&self) -> bool {
        self.normalized() == (None, None, None)
    }
}

pub async fn find_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<ProfileRow>, AppError> {
    let row = sqlx::query_as::<_, ProfileRow>("SELECT * FROM user_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Returns the caller's profile, creating it with the starting balance and a
/// matching bonus transaction on first sight.
pub async fn get_or_create_profile(pool: &PgPool, user: &AuthUser) -> Result<ProfileRow, AppError> {
    if let Some(profile) = find_profile(pool, user.user_id).await? {
        return Ok(profile);
    }

    let mut tx = pool.begin().await?;

    let created = sqlx::query_as::<_, ProfileRow>(
        r#"
        INSERT INTO user_profiles (user_id, email, full_name, credits)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(STARTING_CREDITS)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(profile) = created else {
        // Lost a race with a concurrent first request.
        tx.rollback().await?;
        return find_profile(pool, user.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile for user {} not found", user.user_id)));
    };

    sqlx::query(
        r#"
        INSERT INTO credit_transactions (user_id, transaction_type, credits, description)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user.user_id)
    .bind(TransactionKind::Bonus.as_str())
    .bind(STARTING_CREDITS)
    .bind("Welcome bonus")
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("Created profile for user {} with {STARTING_CREDITS} credits", user.user_id);
    Ok(profile)
}

pub async fn update_profile(
    pool: &PgPool,
    user: &AuthUser,
    update: &ProfileUpdate,
) -> Result<ProfileRow, AppError> {
    let current = get_or_create_profile(pool, user).await?;
    if update.is_empty() {
        return Ok(current);
    }

    let (full_name, phone, avatar_url) = update.normalized();
    let row = sqlx::query_as::<_, ProfileRow>(
        r#"
        UPDATE user_profiles
        SET full_name = COALESCE($2, full_name),
            phone = COALESCE($3, phone),
            avatar_url = COALESCE($4, avatar_url),
            updated_at = now()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(full_name)
    .bind(phone)
    .bind(avatar_url)
    .fetch_one(pool)
    .await?;

    info!("Updated profile for user {}", user.user_id);
    Ok(row)
}
