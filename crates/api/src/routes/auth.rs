//! Authentication route handlers.
//!
//! Credentials live in the identity provider; these handlers relay to it and keep
//! the local account row in step.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use befit_core::{Email, Gender, UserRole};

use crate::db::UserRepository;
use crate::error::{AppError, add_breadcrumb};
use crate::identity::{Attribute, AuthTokens};
use crate::middleware::{BearerToken, RequireAuth};
use crate::models::{NewUser, User};
use crate::routes::form::{MultipartForm, UPLOAD_BODY_LIMIT};
use crate::state::AppState;
use crate::storage::{ImageOwner, validate_image};
use crate::validation::{ValidationError, validate_password};

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/auth/signup",
            post(signup).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/auth/confirm", post(confirm))
        .route("/auth/resend-code", post(resend_code))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/confirm-forgot-password", post(confirm_forgot_password))
        .route("/auth/change-password", post(change_password))
        .route("/auth/me", get(me))
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: &'static str,
    pub user_sub: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub email: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
    /// Needed when the app client has a secret.
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct ConfirmForgotPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: SecretString,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: SecretString,
    pub new_password: SecretString,
}

/// Register with the identity provider and create the local account.
///
/// Multipart fields: `first_name`, `last_name`, `email`, `password`, `gender`,
/// `birth_date` (`YYYY-MM-DD`), and an optional `profile_image` file.
#[instrument(skip(state, multipart))]
pub async fn signup(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    let mut form = MultipartForm::read(multipart).await?;

    let first_name = form.required("first_name")?.to_string();
    let last_name = form.required("last_name")?.to_string();
    let email = parse_email(form.required("email")?)?;
    let password = form.required("password")?.to_string();
    validate_password(&password)?;
    let gender = form
        .text("gender")
        .map(str::parse::<Gender>)
        .transpose()
        .map_err(|e| ValidationError::new("gender", e.to_string()))?;
    let date_of_birth = form
        .text("birth_date")
        .map(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .transpose()
        .map_err(|_| ValidationError::new("birth_date", "must be a date (YYYY-MM-DD)"))?;
    let image = form.take_file("profile_image");
    if let Some(bytes) = &image {
        validate_image(bytes)?;
    }

    let users = UserRepository::new(state.pool());
    if users.get_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let attributes = vec![
        Attribute::new("email", email.as_str()),
        Attribute::new("given_name", first_name.as_str()),
        Attribute::new("family_name", last_name.as_str()),
    ];
    let user_sub = state
        .identity()
        .sign_up(email.as_str(), &SecretString::from(password), attributes)
        .await?;
    add_breadcrumb("auth", "Identity user created", Some(&[("email", email.as_str())]));

    let mut user = users
        .create(&NewUser {
            cognito_sub: Some(user_sub.clone()),
            email,
            first_name,
            last_name,
            gender,
            date_of_birth,
            role: UserRole::User,
            is_verified: false,
        })
        .await?;

    if let Some(bytes) = image {
        match state
            .storage()
            .upload_image(ImageOwner::Profile(user.id), bytes)
            .await
        {
            Ok(url) => {
                users.set_profile_picture(user.id, &url).await?;
                user.profile_picture = Some(url);
            }
            Err(e) => warn!(error = %e, user_id = %user.id, "Profile image upload failed at signup"),
        }
    }

    info!(user_id = %user.id, "User signed up");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User registered. Check your email for the confirmation code.",
            user_sub,
            user,
        }),
    ))
}

/// Confirm the emailed sign-up code and mark the account verified.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn confirm(
    State(state): State<AppState>,
    Json(body): Json<ConfirmRequest>,
) -> Result<Json<Value>, AppError> {
    let email = parse_email(&body.email)?;
    state
        .identity()
        .confirm_sign_up(email.as_str(), body.code.trim())
        .await?;
    UserRepository::new(state.pool()).mark_verified(&email).await?;
    Ok(Json(json!({ "message": "Account confirmed" })))
}

#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn resend_code(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<Value>, AppError> {
    let email = parse_email(&body.email)?;
    state
        .identity()
        .resend_confirmation_code(email.as_str())
        .await?;
    Ok(Json(json!({ "message": "Confirmation code sent" })))
}

/// Log in. Deactivated local accounts are refused even with valid credentials.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthTokens>, AppError> {
    let email = parse_email(&body.email)?;
    let tokens = state
        .identity()
        .initiate_auth(email.as_str(), &body.password)
        .await?;

    let identity = state.identity().get_user(&tokens.access_token).await?;
    let user = UserRepository::new(state.pool())
        .get_by_identity(&identity.sub, identity.linkable_email().as_ref())
        .await?;
    if user.as_ref().is_some_and(|user| !user.account_status) {
        return Err(AppError::Forbidden("Inactive user".to_string()));
    }

    info!("User logged in");
    Ok(Json(tokens))
}

#[instrument(skip(state, body))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AuthTokens>, AppError> {
    let tokens = state
        .identity()
        .refresh(&body.refresh_token, body.email.as_deref())
        .await?;
    Ok(Json(tokens))
}

/// Revoke every token of the caller.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<Value>, AppError> {
    state.identity().global_sign_out(&token).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<Value>, AppError> {
    let email = parse_email(&body.email)?;
    state.identity().forgot_password(email.as_str()).await?;
    Ok(Json(json!({ "message": "Password reset code sent" })))
}

#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn confirm_forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ConfirmForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    use secrecy::ExposeSecret;

    let email = parse_email(&body.email)?;
    validate_password(body.new_password.expose_secret())?;
    state
        .identity()
        .confirm_forgot_password(email.as_str(), body.code.trim(), &body.new_password)
        .await?;
    Ok(Json(json!({ "message": "Password reset" })))
}

#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    use secrecy::ExposeSecret;

    validate_password(body.new_password.expose_secret())?;
    state
        .identity()
        .change_password(&token, &body.old_password, &body.new_password)
        .await?;
    Ok(Json(json!({ "message": "Password changed" })))
}

/// The authenticated user.
pub async fn me(RequireAuth(user): RequireAuth) -> Json<User> {
    Json(user)
}

fn parse_email(raw: &str) -> Result<Email, ValidationError> {
    Email::parse(raw.trim()).map_err(|e| ValidationError::new("email", e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_trims_and_rejects() {
        assert_eq!(parse_email("  ana@befit.mx ").unwrap().as_str(), "ana@befit.mx");
        let err = parse_email("not-an-email").unwrap_err();
        assert_eq!(err.field, "email");
    }
}
