//! Admin account management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin account
//! befit admin create -e admin@befit.mx -f Ana -l Torres
//!
//! # Link it to an existing identity provider user
//! befit admin create -e admin@befit.mx -f Ana -l Torres --cognito-sub 8f1c...
//!
//! # Promote an existing customer
//! befit admin promote -e coach@befit.mx
//! ```

use befit_api::db::{RepositoryError, UserRepository};
use befit_api::models::NewUser;
use befit_core::{Email, UserId, UserRole};
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Repository query failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Name is blank.
    #[error("{0} must not be blank")]
    BlankName(&'static str),

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),

    /// No user with that email.
    #[error("No user found with email: {0}")]
    UserNotFound(String),
}

/// Create a verified admin account.
///
/// # Returns
///
/// The ID of the created user.
pub async fn create_user(
    email: &str,
    first_name: &str,
    last_name: &str,
    cognito_sub: Option<String>,
) -> Result<UserId, AdminError> {
    let new_user = admin_account(email, first_name, last_name, cognito_sub)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    if users.get_by_email(&new_user.email).await?.is_some() {
        return Err(AdminError::UserExists(new_user.email.to_string()));
    }

    tracing::info!("Creating admin user: {}", new_user.email);
    let user = users.create(&new_user).await?;

    tracing::info!(user_id = %user.id, "Admin user created");
    Ok(user.id)
}

/// Grant the admin role to an existing user.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;

    let pool = connect().await?;
    let user = UserRepository::new(&pool)
        .promote_by_email(&email)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UserNotFound(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, "User promoted to admin");
    Ok(())
}

fn admin_account(
    email: &str,
    first_name: &str,
    last_name: &str,
    cognito_sub: Option<String>,
) -> Result<NewUser, AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let first_name = first_name.trim();
    let last_name = last_name.trim();
    if first_name.is_empty() {
        return Err(AdminError::BlankName("first name"));
    }
    if last_name.is_empty() {
        return Err(AdminError::BlankName("last name"));
    }

    Ok(NewUser {
        cognito_sub: cognito_sub.filter(|sub| !sub.trim().is_empty()),
        email,
        first_name: first_name.to_owned(),
        last_name: last_name.to_owned(),
        gender: None,
        date_of_birth: None,
        role: UserRole::Admin,
        is_verified: true,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_account_is_verified_admin() {
        let user = admin_account(" Admin@BeFit.mx ", " Ana ", "Torres", None).unwrap();
        assert_eq!(user.email.as_str(), "admin@befit.mx");
        assert_eq!(user.first_name, "Ana");
        assert_eq!(user.role, UserRole::Admin);
        assert!(user.is_verified);
        assert!(user.cognito_sub.is_none());
    }

    #[test]
    fn test_admin_account_rejects_bad_input() {
        assert!(matches!(
            admin_account("not-an-email", "Ana", "Torres", None),
            Err(AdminError::InvalidEmail(_))
        ));
        assert!(matches!(
            admin_account("a@b.mx", "  ", "Torres", None),
            Err(AdminError::BlankName("first name"))
        ));
    }

    #[test]
    fn test_blank_cognito_sub_is_dropped() {
        let user = admin_account("a@b.mx", "Ana", "Torres", Some(" ".into())).unwrap();
        assert!(user.cognito_sub.is_none());
    }
}
