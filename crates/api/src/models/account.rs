//! Addresses, payment methods, fitness profiles, and notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use befit_core::{
    AddressId, FitnessProfileId, NotificationId, PaymentMethodId, PaymentType, UserId,
};

/// A shipping address owned by a user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub address_name: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub country: String,
    pub state: String,
    pub city: String,
    pub zip_code: String,
    pub recipient_name: String,
    pub phone_number: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Single-line form copied onto orders so later edits don't rewrite history.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut line = self.address_line1.clone();
        if let Some(second) = self.address_line2.as_deref().filter(|s| !s.is_empty()) {
            line.push_str(", ");
            line.push_str(second);
        }
        format!(
            "{line}, {}, {}, {} {}, {}",
            self.city, self.state, self.zip_code, self.country, self.recipient_name
        )
    }
}

/// Address fields accepted on create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub address_name: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub country: String,
    pub state: String,
    pub city: String,
    pub zip_code: String,
    pub recipient_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub is_default: bool,
}

/// A saved payment method.
///
/// `provider_ref` is the gateway token (Stripe `pm_...` or PayPal vault id); it is
/// never returned to clients.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub user_id: UserId,
    pub payment_type: PaymentType,
    #[serde(skip_serializing)]
    pub provider_ref: String,
    pub card_brand: Option<String>,
    pub last_four: Option<String>,
    pub expiration_date: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Payment method fields accepted on create.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethodInput {
    pub payment_type: PaymentType,
    pub provider_ref: String,
    pub card_brand: Option<String>,
    pub last_four: Option<String>,
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Physical profile and goals used to recommend a subscription plan.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FitnessProfile {
    pub id: FitnessProfileId,
    pub user_id: UserId,
    pub fitness_goal: Option<String>,
    pub activity_level: Option<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub attributes: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FitnessProfile {
    /// Plan name stored under `attributes.recommended_plan`.
    #[must_use]
    pub fn recommended_plan(&self) -> Option<&str> {
        befit_core::fitness::plan_from_attributes(&self.attributes)
    }
}

/// Body of `PUT /users/me/fitness-profile`.
#[derive(Debug, Clone, Deserialize)]
pub struct FitnessProfileInput {
    pub fitness_goal: Option<String>,
    pub activity_level: Option<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub attributes: Option<serde_json::Value>,
}

/// An in-app notification.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address(line2: Option<&str>) -> Address {
        Address {
            id: AddressId::new(1),
            user_id: UserId::new(1),
            address_name: Some("Home".to_string()),
            address_line1: "Av. Reforma 222".to_string(),
            address_line2: line2.map(String::from),
            country: "MX".to_string(),
            state: "CDMX".to_string(),
            city: "Ciudad de Mexico".to_string(),
            zip_code: "06600".to_string(),
            recipient_name: "Ana Lopez".to_string(),
            phone_number: "+525512345678".to_string(),
            is_default: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_one_line_with_second_line() {
        assert_eq!(
            address(Some("Piso 4")).one_line(),
            "Av. Reforma 222, Piso 4, Ciudad de Mexico, CDMX, 06600 MX, Ana Lopez"
        );
    }

    #[test]
    fn test_one_line_skips_empty_second_line() {
        assert_eq!(
            address(Some("")).one_line(),
            "Av. Reforma 222, Ciudad de Mexico, CDMX, 06600 MX, Ana Lopez"
        );
    }

    #[test]
    fn test_provider_ref_not_serialized() {
        let method = PaymentMethod {
            id: PaymentMethodId::new(3),
            user_id: UserId::new(1),
            payment_type: PaymentType::CreditCard,
            provider_ref: "pm_1Nabc".to_string(),
            card_brand: Some("visa".to_string()),
            last_four: Some("4242".to_string()),
            expiration_date: Some("12/29".to_string()),
            is_default: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&method).unwrap();
        assert!(json.get("provider_ref").is_none());
        assert_eq!(json["payment_type"], "credit_card");
    }
}
