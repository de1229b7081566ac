//! Payment gateways.
//!
//! Cards are charged through Stripe, PayPal accounts through PayPal. Both
//! return a [`ChargeOutcome`]; a declined charge is an outcome, not an error.
//! Gateway references are stored prefixed with the provider (`stripe:pi_...`,
//! `paypal:CAPTURE-ID`) so refunds reach the right gateway.

pub mod paypal;
pub mod stripe;

use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use befit_core::PaymentType;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::models::PaymentMethod;

pub use paypal::PayPalClient;
pub use stripe::{StripeClient, WebhookEvent};

/// Errors that can occur when talking to a payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered with an error.
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// Failed to parse a gateway response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Amount is not positive or does not fit the gateway's range.
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Stored reference has no known provider prefix.
    #[error("unknown payment reference: {0}")]
    UnknownReference(String),

    /// Webhook signature is missing, stale, or wrong.
    #[error("invalid webhook signature")]
    InvalidSignature,
}

impl PaymentError {
    /// HTTP status to answer with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidAmount(_) | Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::Http(_) | Self::Api { .. } | Self::Parse(_) => StatusCode::BAD_GATEWAY,
            Self::UnknownReference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::InvalidAmount(_) => "Invalid payment amount".to_string(),
            Self::InvalidSignature => "Invalid signature".to_string(),
            Self::UnknownReference(_) => "Internal server error".to_string(),
            Self::Http(_) | Self::Api { .. } | Self::Parse(_) => {
                "External service error".to_string()
            }
        }
    }
}

/// Where a charge lives at its gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentReference {
    /// A Stripe PaymentIntent ID.
    Stripe(String),
    /// A PayPal capture ID.
    PayPal(String),
}

impl PaymentReference {
    /// Parse a stored `provider:id` reference.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::UnknownReference` without a known prefix.
    pub fn parse(stored: &str) -> Result<Self, PaymentError> {
        match stored.split_once(':') {
            Some(("stripe", id)) if !id.is_empty() => Ok(Self::Stripe(id.to_string())),
            Some(("paypal", id)) if !id.is_empty() => Ok(Self::PayPal(id.to_string())),
            _ => Err(PaymentError::UnknownReference(stored.to_string())),
        }
    }

    /// Stored form of a Stripe PaymentIntent ID.
    #[must_use]
    pub fn stripe_stored(intent_id: &str) -> String {
        Self::Stripe(intent_id.to_string()).to_string()
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stripe(id) => write!(f, "stripe:{id}"),
            Self::PayPal(id) => write!(f, "paypal:{id}"),
        }
    }
}

/// Result of a charge attempt.
#[derive(Debug, Clone)]
pub enum ChargeOutcome {
    /// Money captured.
    Paid { reference: PaymentReference },
    /// Accepted, settles asynchronously (confirmed by webhook).
    Pending { reference: PaymentReference },
    /// Refused by the issuer or the gateway.
    Declined { reason: String },
}

/// Convert an amount to minor currency units (cents).
///
/// # Errors
///
/// Returns `PaymentError::InvalidAmount` for non-positive or oversized amounts.
pub fn to_minor_units(amount: Decimal) -> Result<i64, PaymentError> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(amount));
    }
    (amount.round_dp(2) * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or(PaymentError::InvalidAmount(amount))
}

/// The configured gateways, dispatched by payment type.
pub struct PaymentGateways {
    stripe: StripeClient,
    paypal: PayPalClient,
}

impl PaymentGateways {
    /// Build both gateway clients.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let currency = &config.commerce.currency;

        Ok(Self {
            stripe: StripeClient::new(
                client.clone(),
                config.stripe.secret_key.clone(),
                config.stripe.webhook_secret.clone(),
                currency,
            ),
            paypal: PayPalClient::new(
                client,
                &config.paypal.base_url,
                &config.paypal.client_id,
                config.paypal.client_secret.clone(),
                currency,
            ),
        })
    }

    #[must_use]
    pub const fn stripe(&self) -> &StripeClient {
        &self.stripe
    }

    /// Charge a saved payment method.
    ///
    /// `idempotency_key` makes retries of the same logical charge safe.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` for gateway failures other than declines.
    pub async fn charge(
        &self,
        method: &PaymentMethod,
        amount: Decimal,
        description: &str,
        idempotency_key: &str,
    ) -> Result<ChargeOutcome, PaymentError> {
        match method.payment_type {
            PaymentType::CreditCard | PaymentType::DebitCard => {
                self.stripe
                    .charge(&method.provider_ref, amount, description, idempotency_key)
                    .await
            }
            PaymentType::Paypal => {
                self.paypal
                    .charge(&method.provider_ref, amount, description, idempotency_key)
                    .await
            }
        }
    }

    /// Refund a stored reference in full.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::UnknownReference` or the gateway's error.
    pub async fn refund(&self, stored_reference: &str) -> Result<(), PaymentError> {
        match PaymentReference::parse(stored_reference)? {
            PaymentReference::Stripe(intent) => self.stripe.refund(&intent).await,
            PaymentReference::PayPal(capture) => self.paypal.refund(&capture).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_reference_display_and_parse() {
        let reference = PaymentReference::Stripe("pi_123".to_string());
        assert_eq!(reference.to_string(), "stripe:pi_123");
        assert_eq!(PaymentReference::parse("stripe:pi_123").unwrap(), reference);
        assert_eq!(
            PaymentReference::parse("paypal:8AB").unwrap(),
            PaymentReference::PayPal("8AB".to_string())
        );
        assert!(PaymentReference::parse("pi_123").is_err());
        assert!(PaymentReference::parse("stripe:").is_err());
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::from_str("1299.50").unwrap()).unwrap(), 129_950);
        assert_eq!(to_minor_units(Decimal::from_str("0.015").unwrap()).unwrap(), 2);
        assert!(to_minor_units(Decimal::ZERO).is_err());
        assert!(to_minor_units(Decimal::from_str("-5").unwrap()).is_err());
    }

    #[test]
    fn test_payment_error_statuses() {
        assert_eq!(PaymentError::InvalidSignature.status(), StatusCode::BAD_REQUEST);
        let err = PaymentError::Api {
            provider: "stripe",
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.client_message(), "External service error");
    }
}
