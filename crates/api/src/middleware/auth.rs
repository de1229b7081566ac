//! Bearer-token authentication extractors.
//!
//! The access token is verified against the identity provider (cached for a few
//! minutes) and mapped to the local account by provider subject, falling back to
//! a one-time link by verified email for accounts created before their first
//! login.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::state::AppState;

/// The raw access token from `Authorization: Bearer <token>`.
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .map(|token| Self(token.to_string()))
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))
    }
}

/// Extractor that requires an authenticated, active user.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireAuth(user): RequireAuth) -> Json<User> {
///     Json(user)
/// }
/// ```
pub struct RequireAuth(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let identity = state.identity().get_user(&token).await?;
        let email = identity.linkable_email();

        let user = UserRepository::new(state.pool())
            .get_by_identity(&identity.sub, email.as_ref())
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

        if !user.account_status {
            return Err(AppError::Forbidden("Inactive user".to_string()));
        }

        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(Self(user))
    }
}

/// Extractor that requires an authenticated admin.
#[derive(Debug)]
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        ensure_admin(user).map(Self)
    }
}

fn ensure_admin(user: User) -> Result<User, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ));
    }
    Ok(user)
}

/// Token part of a `Bearer` authorization header. The scheme is case-insensitive.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use befit_core::{AuthType, Email, UserId, UserRole};
    use chrono::Utc;

    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: UserId::new(1),
            cognito_sub: Some("0f6c-sub".to_string()),
            email: Email::parse("ana@example.com").unwrap(),
            first_name: "Ana".to_string(),
            last_name: "Lima".to_string(),
            gender: None,
            date_of_birth: None,
            profile_picture: None,
            auth_type: AuthType::Email,
            role,
            account_status: true,
            is_verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_customers_are_forbidden_from_admin_routes() {
        let err = ensure_admin(user(UserRole::User)).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            err.to_string(),
            "You do not have permission to perform this action"
        );
    }

    #[test]
    fn test_admins_pass_the_admin_check() {
        let admin = ensure_admin(user(UserRole::Admin)).unwrap();
        assert_eq!(admin.role, UserRole::Admin);
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic dXNlcg=="), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }
}
