use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::audit::AuditChange;
use crate::auth::passwords::{hash_password, verify_password};
use crate::auth::tokens::{issue_token, revoke_token};
use crate::auth::{bearer_token, AuthUser};
use crate::errors::{validate_body, AppError};
use crate::extract::AppJson;
use crate::models::user::{Role, User};
use crate::state::AppState;

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, role, phone, is_active, created_at, updated_at";

#[derive(Serialize)]
pub struct TokenResponse {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "a valid email address is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub first_name: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub last_name: String,
    #[validate(length(max = 20))]
    #[serde(default)]
    pub phone: String,
    pub role: Option<Role>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Self-registration is candidate-only. Admins may create any role, and the
/// very first account may pick its own.
fn registration_role(
    requested: Option<Role>,
    caller: Option<&AuthUser>,
    existing_users: i64,
) -> Result<Role, AppError> {
    let role = requested.unwrap_or(Role::Candidate);
    let privileged = existing_users == 0 || caller.is_some_and(AuthUser::is_admin);
    if role != Role::Candidate && !privileged {
        return Err(AppError::forbidden(format!(
            "Only administrators can register {role} accounts"
        )));
    }
    Ok(role)
}

/// POST /api/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, AuditChange, Json<TokenResponse>), AppError> {
    validate_body(&req)?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;
    let role = registration_role(req.role, caller.as_ref(), existing)?;

    let email = normalize_email(&req.email);
    let password_hash = hash_password(&req.password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name, role, phone)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&email)
    .bind(&password_hash)
    .bind(req.first_name.trim())
    .bind(req.last_name.trim())
    .bind(role.as_str())
    .bind(req.phone.trim())
    .fetch_one(&state.db)
    .await?;

    let issued = issue_token(&state.db, user.id, state.config.token_ttl_hours).await?;
    info!("Registered {} user {} ({})", role, user.id, user.full_name());

    Ok((
        StatusCode::CREATED,
        AuditChange::created("users", user.id, &user),
        Json(TokenResponse {
            user,
            token: issued.token,
            expires_at: issued.expires_at,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(sqlx::FromRow)]
struct Credentials {
    id: Uuid,
    password_hash: String,
    is_active: bool,
}

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let credentials = sqlx::query_as::<_, Credentials>(
        "SELECT id, password_hash, is_active FROM users WHERE email = $1",
    )
    .bind(normalize_email(&req.email))
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::InvalidCredentials)?;

    if !credentials.is_active || !verify_password(&req.password, &credentials.password_hash) {
        return Err(AppError::InvalidCredentials);
    }

    let user = fetch_user(&state, credentials.id).await?;
    let issued = issue_token(&state.db, user.id, state.config.token_ttl_hours).await?;
    Ok(Json(TokenResponse {
        user,
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

async fn fetch_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {id}")))
}

/// GET /api/auth/user
pub async fn handle_current_user(user: AuthUser) -> Json<User> {
    Json(user.user)
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

/// PATCH /api/auth/user
pub async fn handle_update_user(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> Result<(AuditChange, Json<User>), AppError> {
    validate_body(&req)?;

    let updated = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users SET
            first_name = COALESCE($2, first_name),
            last_name  = COALESCE($3, last_name),
            phone      = COALESCE($4, phone),
            updated_at = now()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.id())
    .bind(req.first_name.as_deref().map(str::trim))
    .bind(req.last_name.as_deref().map(str::trim))
    .bind(req.phone.as_deref().map(str::trim))
    .fetch_one(&state.db)
    .await?;

    Ok((
        AuditChange::updated("users", updated.id, &user.user, &updated),
        Json(updated),
    ))
}

/// POST /api/auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    _user: AuthUser,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    if let Some(token) = bearer_token(&headers) {
        revoke_token(&state.db, token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::auth_user;

    #[test]
    fn test_self_registration_is_candidate_only() {
        assert_eq!(registration_role(None, None, 5).unwrap(), Role::Candidate);
        assert!(matches!(
            registration_role(Some(Role::Admin), None, 5),
            Err(AppError::Forbidden(_))
        ));
        let recruiter = auth_user(Role::Recruiter);
        assert!(registration_role(Some(Role::Interviewer), Some(&recruiter), 5).is_err());
    }

    #[test]
    fn test_admin_and_bootstrap_may_pick_roles() {
        let admin = auth_user(Role::Admin);
        assert_eq!(
            registration_role(Some(Role::Recruiter), Some(&admin), 5).unwrap(),
            Role::Recruiter
        );
        assert_eq!(
            registration_role(Some(Role::Admin), None, 0).unwrap(),
            Role::Admin
        );
    }

    #[test]
    fn test_register_validation() {
        let req = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            phone: String::new(),
            role: None,
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_email_is_normalized() {
        assert_eq!(normalize_email("  Aiko.Sato@Example.COM "), "aiko.sato@example.com");
    }
}
