//! System user resolution.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::model::User;

/// Look up or create the reserved identity that owns all daily-generated
/// parlays. Keyed by email, idempotent, never duplicates.
///
/// IMPORTANT:
/// If the insert conflicts (the user already exists), DO NOT return the
/// newly generated UUID. That UUID would not exist in `users`, causing FK
/// violations downstream.
pub async fn get_or_create_system_user(pool: &PgPool, email: &str) -> Result<User> {
    let inserted: Option<User> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, full_name, subscription_tier)
        VALUES ($1, $2, 'Daily Picks Engine', 'whale')
        ON CONFLICT (email) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .fetch_optional(pool)
    .await?;

    if let Some(user) = inserted {
        return Ok(user);
    }

    let user: User = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(user)
}
