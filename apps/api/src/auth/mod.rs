//! Bearer-token identification and role checks.
//!
//! `identify` runs outermost on every request: it resolves the token (if any)
//! and stores an `AuthUser` in the request extensions. Handlers that need an
//! identity take `AuthUser` as an extractor (401 when absent); handlers that
//! work for anonymous callers take `Option<AuthUser>`.

pub mod handlers;
pub mod passwords;
pub mod permissions;
pub mod tokens;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::{Role, User};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub role: Role,
}

impl AuthUser {
    pub fn new(user: User) -> Self {
        let role = user.role();
        Self { user, role }
    }

    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Extracts `<token>` from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

pub async fn identify(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        match tokens::resolve_token(&state.db, token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthUser::new(user));
            }
            Ok(None) => {}
            Err(e) => warn!("Token lookup failed: {e}"),
        }
    }
    next.run(request).await
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;

    use super::*;

    pub fn auth_user(role: Role) -> AuthUser {
        AuthUser::new(User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", role.as_str()),
            first_name: "Test".to_string(),
            last_name: role.as_str().to_string(),
            role: role.as_str().to_string(),
            phone: String::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&headers("bearer  abc123 ")), Some("abc123"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_extractor_rejects_anonymous_requests() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let result = AuthUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));

        parts
            .extensions
            .insert(test_support::auth_user(Role::Recruiter));
        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.role, Role::Recruiter);
    }
}
