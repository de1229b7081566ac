//! Stripe PaymentIntents, refunds, and webhook signatures.

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, instrument};

use super::{ChargeOutcome, PaymentError, PaymentReference, to_minor_units};

const API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a webhook timestamp.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Stripe REST client.
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: SecretString,
    webhook_secret: SecretString,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    status: String,
    last_payment_error: Option<StripeErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
    payment_intent: Option<PaymentIntentRef>,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentRef {
    id: String,
}

impl StripeClient {
    pub(crate) fn new(
        client: reqwest::Client,
        secret_key: SecretString,
        webhook_secret: SecretString,
        currency: &str,
    ) -> Self {
        Self {
            client,
            secret_key,
            webhook_secret,
            currency: currency.to_lowercase(),
        }
    }

    /// Create and confirm an off-session PaymentIntent for a saved method.
    ///
    /// # Errors
    ///
    /// Card declines are an `Ok(ChargeOutcome::Declined)`; other failures are errors.
    #[instrument(skip(self, payment_method))]
    pub async fn charge(
        &self,
        payment_method: &str,
        amount: Decimal,
        description: &str,
        idempotency_key: &str,
    ) -> Result<ChargeOutcome, PaymentError> {
        let minor = to_minor_units(amount)?.to_string();
        let form = [
            ("amount", minor.as_str()),
            ("currency", self.currency.as_str()),
            ("payment_method", payment_method),
            ("description", description),
            ("confirm", "true"),
            ("off_session", "true"),
        ];

        let response = self
            .client
            .post(format!("{API_BASE}/payment_intents"))
            .bearer_auth(self.secret_key.expose_secret())
            .header("Idempotency-Key", idempotency_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let envelope: ErrorEnvelope = serde_json::from_str(&text)
                .map_err(|e| PaymentError::Parse(format!("stripe error body: {e}")))?;
            let err = envelope.error;
            if err.error_type.as_deref() == Some("card_error") {
                debug!(intent = ?err.payment_intent.as_ref().map(|p| &p.id), "Card declined");
                return Ok(ChargeOutcome::Declined {
                    reason: err.message.unwrap_or_else(|| "Card declined".to_string()),
                });
            }
            return Err(PaymentError::Api {
                provider: "stripe",
                status: status.as_u16(),
                message: err.message.unwrap_or(text),
            });
        }

        let intent: PaymentIntent = serde_json::from_str(&text)
            .map_err(|e| PaymentError::Parse(format!("payment intent: {e}")))?;
        Ok(outcome_for(intent))
    }

    /// Refund a PaymentIntent in full.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Api` if Stripe rejects the refund.
    #[instrument(skip(self))]
    pub async fn refund(&self, payment_intent: &str) -> Result<(), PaymentError> {
        let response = self
            .client
            .post(format!("{API_BASE}/refunds"))
            .bearer_auth(self.secret_key.expose_secret())
            .header("Idempotency-Key", format!("refund-{payment_intent}"))
            .form(&[("payment_intent", payment_intent)])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or(text);
        Err(PaymentError::Api {
            provider: "stripe",
            status: status.as_u16(),
            message,
        })
    }

    /// Verify a `Stripe-Signature` header against the webhook secret.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` if no `v1` signature matches or
    /// the timestamp is outside the tolerance.
    pub fn verify_webhook(&self, payload: &[u8], header: &str, now: i64) -> Result<(), PaymentError> {
        verify_signature(self.webhook_secret.expose_secret(), payload, header, now)
    }
}

fn outcome_for(intent: PaymentIntent) -> ChargeOutcome {
    match intent.status.as_str() {
        "succeeded" => ChargeOutcome::Paid {
            reference: PaymentReference::Stripe(intent.id),
        },
        "processing" => ChargeOutcome::Pending {
            reference: PaymentReference::Stripe(intent.id),
        },
        other => ChargeOutcome::Declined {
            reason: intent
                .last_payment_error
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("Payment not completed ({other})")),
        },
    }
}

/// Verify a Stripe webhook signature header (`t=...,v1=...`).
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` when the header is malformed, stale,
/// or carries no matching `v1` signature.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PaymentError::InvalidSignature)?;
    if (now - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature);
    }

    let matches = signatures.iter().any(|signature| {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });

    if matches {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature)
    }
}

/// A webhook event. Only the fields the handler reads.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// ID of the object the event is about, e.g. the PaymentIntent.
    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_verify_signature_accepts_valid_header() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = format!("t=1700000000,v1={}", sign("whsec_test", 1_700_000_000, payload));
        assert!(verify_signature("whsec_test", payload, &header, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_verify_signature_accepts_any_v1() {
        let payload = b"{}";
        let header = format!(
            "t=1700000000,v1=deadbeef,v0=abc,v1={}",
            sign("whsec_test", 1_700_000_000, payload)
        );
        assert!(verify_signature("whsec_test", payload, &header, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_verify_signature_rejects_stale_or_tampered() {
        let payload = b"{}";
        let header = format!("t=1700000000,v1={}", sign("whsec_test", 1_700_000_000, payload));

        assert!(verify_signature("whsec_test", payload, &header, 1_700_000_301).is_err());
        assert!(verify_signature("whsec_test", b"{\"x\":1}", &header, 1_700_000_000).is_err());
        assert!(verify_signature("other", payload, &header, 1_700_000_000).is_err());
        assert!(verify_signature("whsec_test", payload, "v1=abc", 1_700_000_000).is_err());
    }

    #[test]
    fn test_outcome_for_intent_status() {
        let intent = |status: &str| PaymentIntent {
            id: "pi_1".to_string(),
            status: status.to_string(),
            last_payment_error: None,
        };
        assert!(matches!(outcome_for(intent("succeeded")), ChargeOutcome::Paid { .. }));
        assert!(matches!(outcome_for(intent("processing")), ChargeOutcome::Pending { .. }));
        assert!(matches!(
            outcome_for(intent("requires_action")),
            ChargeOutcome::Declined { .. }
        ));
    }

    #[test]
    fn test_webhook_event_object_id() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_9"}}}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, "payment_intent.succeeded");
        assert_eq!(event.object_id(), Some("pi_9"));
    }
}
