//! Account route handlers: profile, fitness profile, addresses, payment methods
//! and notifications. Every route acts on the authenticated caller only.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use befit_core::fitness::with_recommended_plan;
use befit_core::{AddressId, NotificationId, PaymentMethodId};

use crate::db::{
    AddressRepository, FitnessProfileRepository, NotificationRepository, PaymentMethodRepository,
    UserRepository,
};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{
    Address, AddressInput, FitnessProfile, FitnessProfileInput, Notification, PaymentMethod,
    PaymentMethodInput, User, UserUpdate,
};
use crate::routes::form::{MultipartForm, UPLOAD_BODY_LIMIT};
use crate::state::AppState;
use crate::storage::{ImageOwner, validate_image};
use crate::validation::{ValidationError, validate_address, validate_payment_method};

/// Build the account router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me).patch(update_me))
        .route(
            "/users/me/profile-image",
            post(upload_profile_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/users/me/fitness-profile",
            get(get_fitness_profile).put(put_fitness_profile),
        )
        .route("/addresses", get(list_addresses).post(create_address))
        .route(
            "/addresses/{id}",
            get(get_address).put(update_address).delete(delete_address),
        )
        .route("/addresses/{id}/default", patch(default_address))
        .route(
            "/payment-methods",
            get(list_payment_methods).post(create_payment_method),
        )
        .route(
            "/payment-methods/{id}",
            get(get_payment_method).delete(delete_payment_method),
        )
        .route("/payment-methods/{id}/default", patch(default_payment_method))
        .route("/notifications", get(list_notifications))
        .route("/notifications/{id}/read", patch(read_notification))
        .route("/notifications/read-all", patch(read_all_notifications))
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

pub async fn me(RequireAuth(user): RequireAuth) -> Json<User> {
    Json(user)
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<UserUpdate>,
) -> Result<Json<User>, AppError> {
    let body = UserUpdate {
        first_name: non_blank("first_name", body.first_name)?,
        last_name: non_blank("last_name", body.last_name)?,
        ..body
    };
    let updated = UserRepository::new(state.pool())
        .update_profile(user.id, &body)
        .await?;
    Ok(Json(updated))
}

/// Replace the profile picture. The previous object is removed after the new one
/// is stored.
#[instrument(skip(state, user, multipart), fields(user_id = %user.id))]
pub async fn upload_profile_image(
    State(state): State<AppState>,
    RequireAuth(mut user): RequireAuth,
    multipart: Multipart,
) -> Result<Json<User>, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let bytes = form
        .take_file("image")
        .ok_or_else(|| ValidationError::new("image", "field required"))?;
    validate_image(&bytes)?;

    let url = state
        .storage()
        .upload_image(ImageOwner::Profile(user.id), bytes)
        .await?;
    let previous = UserRepository::new(state.pool())
        .set_profile_picture(user.id, &url)
        .await?;
    if let Some(old) = previous.filter(|old| *old != url) {
        state.storage().delete_by_url(&old).await;
    }

    info!("Profile image replaced");
    user.profile_picture = Some(url);
    Ok(Json(user))
}

pub async fn get_fitness_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<FitnessProfile>, AppError> {
    FitnessProfileRepository::new(state.pool())
        .get_for_user(user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Fitness profile not found".to_string()))
}

/// Create or replace the fitness profile and recompute the recommended plan.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn put_fitness_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<FitnessProfileInput>,
) -> Result<Json<FitnessProfile>, AppError> {
    positive("weight", body.weight)?;
    positive("height", body.height)?;

    let attributes = with_recommended_plan(body.attributes.clone(), body.fitness_goal.as_deref());
    let profile = FitnessProfileRepository::new(state.pool())
        .upsert(user.id, &body, &attributes)
        .await?;
    Ok(Json(profile))
}

pub async fn list_addresses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Address>>, AppError> {
    let addresses = AddressRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(addresses))
}

pub async fn get_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>, AppError> {
    AddressRepository::new(state.pool())
        .get(user.id, id)
        .await?
        .map(Json)
        .ok_or_else(address_not_found)
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>), AppError> {
    let input = validate_address(body)?;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
    Json(body): Json<AddressInput>,
) -> Result<Json<Address>, AppError> {
    let input = validate_address(body)?;
    let address = AddressRepository::new(state.pool())
        .update(user.id, id, &input)
        .await
        .map_err(owned_not_found(address_not_found))?;
    Ok(Json(address))
}

pub async fn default_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>, AppError> {
    let address = AddressRepository::new(state.pool())
        .set_default(user.id, id)
        .await
        .map_err(owned_not_found(address_not_found))?;
    Ok(Json(address))
}

pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<StatusCode, AppError> {
    AddressRepository::new(state.pool())
        .delete(user.id, id)
        .await
        .map_err(owned_not_found(address_not_found))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_payment_methods(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<PaymentMethod>>, AppError> {
    let methods = PaymentMethodRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(methods))
}

pub async fn get_payment_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PaymentMethodId>,
) -> Result<Json<PaymentMethod>, AppError> {
    PaymentMethodRepository::new(state.pool())
        .get(user.id, id)
        .await?
        .map(Json)
        .ok_or_else(payment_method_not_found)
}

/// Save a tokenized method. Card data never reaches this service; the client
/// sends the gateway token and its display fields.
#[instrument(skip(state, user, body), fields(user_id = %user.id, payment_type = ?body.payment_type))]
pub async fn create_payment_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<PaymentMethodInput>,
) -> Result<(StatusCode, Json<PaymentMethod>), AppError> {
    validate_payment_method(&body)?;
    let method = PaymentMethodRepository::new(state.pool())
        .create(user.id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(method)))
}

pub async fn default_payment_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PaymentMethodId>,
) -> Result<Json<PaymentMethod>, AppError> {
    let method = PaymentMethodRepository::new(state.pool())
        .set_default(user.id, id)
        .await
        .map_err(owned_not_found(payment_method_not_found))?;
    Ok(Json(method))
}

/// Delete a method. Refused with 409 while a live subscription bills it.
pub async fn delete_payment_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PaymentMethodId>,
) -> Result<StatusCode, AppError> {
    PaymentMethodRepository::new(state.pool())
        .delete(user.id, id)
        .await
        .map_err(owned_not_found(payment_method_not_found))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_notifications(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = NotificationRepository::new(state.pool())
        .list_for_user(user.id, query.unread_only)
        .await?;
    Ok(Json(notifications))
}

pub async fn read_notification(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<NotificationId>,
) -> Result<Json<Notification>, AppError> {
    let notification = NotificationRepository::new(state.pool())
        .mark_read(user.id, id)
        .await
        .map_err(owned_not_found(|| {
            AppError::NotFound("Notification not found".to_string())
        }))?;
    Ok(Json(notification))
}

pub async fn read_all_notifications(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>, AppError> {
    let updated = NotificationRepository::new(state.pool())
        .mark_all_read(user.id)
        .await?;
    Ok(Json(json!({ "updated": updated })))
}

fn address_not_found() -> AppError {
    AppError::NotFound("Address not found".to_string())
}

fn payment_method_not_found() -> AppError {
    AppError::NotFound("Payment method not found".to_string())
}

/// Replace the generic repository 404 with a resource-specific one.
fn owned_not_found(
    not_found: impl FnOnce() -> AppError,
) -> impl FnOnce(crate::db::RepositoryError) -> AppError {
    move |err| match err {
        crate::db::RepositoryError::NotFound => not_found(),
        other => AppError::Database(other),
    }
}

fn non_blank(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, ValidationError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Err(ValidationError::new(field, "must not be blank")),
        other => Ok(other),
    }
}

fn positive(field: &'static str, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => {
            Err(ValidationError::new(field, "must be a positive number"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank_trims_and_rejects_empty() {
        assert_eq!(
            non_blank("first_name", Some("  Ana ".to_string())).unwrap(),
            Some("Ana".to_string())
        );
        assert_eq!(non_blank("first_name", None).unwrap(), None);
        let err = non_blank("last_name", Some("   ".to_string())).unwrap_err();
        assert_eq!(err.field, "last_name");
    }

    #[test]
    fn test_positive_measurements() {
        assert!(positive("weight", Some(72.5)).is_ok());
        assert!(positive("weight", None).is_ok());
        assert!(positive("height", Some(0.0)).is_err());
        assert!(positive("height", Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_owned_not_found_keeps_other_errors() {
        let err = owned_not_found(address_not_found)(crate::db::RepositoryError::NotFound);
        assert_eq!(err.to_string(), "Address not found");

        let err = owned_not_found(address_not_found)(crate::db::RepositoryError::Conflict(
            "in use".to_string(),
        ));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
