//! User domain types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use befit_core::{AuthType, Email, Gender, UserId, UserRole};

/// A BeFit customer or administrator.
///
/// The identity provider owns credentials; this row owns everything else.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    /// Subject of the identity provider account, absent for seeded accounts.
    #[serde(skip_serializing)]
    pub cognito_sub: Option<String>,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub profile_picture: Option<String>,
    pub auth_type: AuthType,
    pub role: UserRole,
    /// `false` once an admin deactivates the account.
    pub account_status: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether this user may call admin routes.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// First and last name joined by a space.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Partial profile update sent to `PATCH /users/me`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Fields needed to create the local account row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub cognito_sub: Option<String>,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub role: UserRole,
    pub is_verified: bool,
}
