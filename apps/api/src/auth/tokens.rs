use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::User;

/// Only the SHA-256 of a bearer token is ever stored.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn issue_token(
    pool: &PgPool,
    user_id: Uuid,
    ttl_hours: i64,
) -> Result<IssuedToken, AppError> {
    let token = Uuid::new_v4().simple().to_string();
    let expires_at = Utc::now() + Duration::hours(ttl_hours);

    sqlx::query("INSERT INTO api_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(hash_token(&token))
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(IssuedToken { token, expires_at })
}

/// Looks up the active user owning an unexpired, unrevoked token.
pub async fn resolve_token(pool: &PgPool, token: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.email, u.first_name, u.last_name, u.role, u.phone,
               u.is_active, u.created_at, u.updated_at
        FROM api_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.token_hash = $1
          AND t.revoked_at IS NULL
          AND t.expires_at > now()
          AND u.is_active
        "#,
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await
}

pub async fn revoke_token(pool: &PgPool, token: &str) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE api_tokens SET revoked_at = now() WHERE token_hash = $1 AND revoked_at IS NULL",
    )
    .bind(hash_token(token))
    .execute(pool)
    .await?;
    Ok(())
}
