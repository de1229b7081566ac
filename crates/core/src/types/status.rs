//! Status and classification enums.
//!
//! Every enum here maps to a `PostgreSQL` enum type in the `befit` schema (with the
//! `postgres` feature) and serializes to the same lower-case string on the wire.

use serde::{Deserialize, Serialize};

/// Error returned when parsing an enum from an unknown string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// Which enum failed to parse.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` from one variant table.
macro_rules! string_enum {
    ($name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Wire and database spelling of this value.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Account role. Admins reach the `/admin` routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "befit.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

string_enum!(UserRole, "user role" { User => "user", Admin => "admin" });

/// Self-reported gender collected at signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "befit.gender"))]
pub enum Gender {
    #[serde(rename = "M")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "M"))]
    Male,
    #[serde(rename = "F")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "F"))]
    Female,
    #[serde(rename = "prefer_not_say")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "prefer_not_say"))]
    PreferNotSay,
}

string_enum!(Gender, "gender" {
    Male => "M",
    Female => "F",
    PreferNotSay => "prefer_not_say",
});

/// How the account signs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "befit.auth_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    Email,
    Google,
    Facebook,
}

string_enum!(AuthType, "auth type" {
    Email => "email",
    Google => "google",
    Facebook => "facebook",
});

/// Order lifecycle status. Transitions live in [`crate::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "befit.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

string_enum!(OrderStatus, "order status" {
    Pending => "pending",
    Paid => "paid",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

/// Result of charging the order's payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "befit.payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

string_enum!(PaymentStatus, "payment status" {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

/// Subscription lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "befit.subscription_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Cancelled,
}

string_enum!(SubscriptionStatus, "subscription status" {
    Active => "active",
    Paused => "paused",
    Cancelled => "cancelled",
});

/// Kind of saved payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "befit.payment_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    CreditCard,
    DebitCard,
    Paypal,
}

impl PaymentType {
    /// Cards are charged through Stripe and can back a subscription.
    #[must_use]
    pub const fn is_card(&self) -> bool {
        matches!(self, Self::CreditCard | Self::DebitCard)
    }
}

string_enum!(PaymentType, "payment type" {
    CreditCard => "credit_card",
    DebitCard => "debit_card",
    Paypal => "paypal",
});

/// Loyalty point ledger entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "befit.point_event_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PointEventType {
    Earned,
    Expired,
}

string_enum!(PointEventType, "point event type" {
    Earned => "earned",
    Expired => "expired",
});

/// Admin bulk operation over a set of products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductBulkAction {
    Activate,
    Deactivate,
    Delete,
}

string_enum!(ProductBulkAction, "bulk action" {
    Activate => "activate",
    Deactivate => "deactivate",
    Delete => "delete",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Delivered).unwrap(),
            format!("\"{}\"", OrderStatus::Delivered)
        );
        assert_eq!(
            serde_json::to_string(&PaymentType::CreditCard).unwrap(),
            "\"credit_card\""
        );
        assert_eq!(serde_json::to_string(&Gender::Female).unwrap(), "\"F\"");
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        let err = "shipped_twice".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.kind, "order status");
        assert_eq!(err.to_string(), "invalid order status: shipped_twice");
    }

    #[test]
    fn test_from_str_accepts_known() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!(
            "prefer_not_say".parse::<Gender>().unwrap(),
            Gender::PreferNotSay
        );
        assert_eq!(
            "deactivate".parse::<ProductBulkAction>().unwrap(),
            ProductBulkAction::Deactivate
        );
    }

    #[test]
    fn test_only_cards_back_subscriptions() {
        assert!(PaymentType::CreditCard.is_card());
        assert!(PaymentType::DebitCard.is_card());
        assert!(!PaymentType::Paypal.is_card());
    }
}
