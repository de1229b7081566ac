//! PayPal Orders v2 with vaulted payment tokens.

use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::{ChargeOutcome, PaymentError, PaymentReference};

/// Refresh the token this long before PayPal says it expires.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

/// PayPal REST client.
pub struct PayPalClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: SecretString,
    currency: String,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    payments: Option<Payments>,
}

#[derive(Debug, Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct PayPalErrorBody {
    name: Option<String>,
    message: Option<String>,
}

impl PayPalClient {
    pub(crate) fn new(
        client: reqwest::Client,
        base_url: &str,
        client_id: &str,
        client_secret: SecretString,
        currency: &str,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret,
            currency: currency.to_uppercase(),
            token: Mutex::new(None),
        }
    }

    /// OAuth client-credentials token, cached until shortly before expiry.
    async fn access_token(&self) -> Result<String, PaymentError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now()
        {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &response.text().await.unwrap_or_default()));
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_MARGIN);
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        debug!(expires_in = body.expires_in, "Fetched PayPal access token");
        Ok(body.access_token)
    }

    /// Create an order with `intent=CAPTURE` paid by a vaulted token.
    ///
    /// # Errors
    ///
    /// Instrument declines are an `Ok(ChargeOutcome::Declined)`; other failures are errors.
    #[instrument(skip(self, vault_id))]
    pub async fn charge(
        &self,
        vault_id: &str,
        amount: Decimal,
        description: &str,
        idempotency_key: &str,
    ) -> Result<ChargeOutcome, PaymentError> {
        let token = self.access_token().await?;
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "description": description,
                "amount": {
                    "currency_code": self.currency,
                    "value": format!("{:.2}", amount.round_dp(2)),
                },
            }],
            "payment_source": {
                "paypal": { "vault_id": vault_id },
            },
        });

        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(token)
            .header("PayPal-Request-Id", idempotency_key)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let reason = serde_json::from_str::<PayPalErrorBody>(&text)
                .ok()
                .and_then(|b| b.message.or(b.name))
                .unwrap_or_else(|| "Payment declined".to_string());
            return Ok(ChargeOutcome::Declined { reason });
        }
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }

        let order: OrderResponse = serde_json::from_str(&text)
            .map_err(|e| PaymentError::Parse(format!("paypal order: {e}")))?;
        Ok(outcome_for(order))
    }

    /// Refund a capture in full.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Api` if PayPal rejects the refund.
    #[instrument(skip(self))]
    pub async fn refund(&self, capture_id: &str) -> Result<(), PaymentError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!(
                "{}/v2/payments/captures/{capture_id}/refund",
                self.base_url
            ))
            .bearer_auth(token)
            .header("PayPal-Request-Id", format!("refund-{capture_id}"))
            .json(&json!({}))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(api_error(status.as_u16(), &response.text().await.unwrap_or_default()))
    }
}

fn api_error(status: u16, text: &str) -> PaymentError {
    let message = serde_json::from_str::<PayPalErrorBody>(text)
        .ok()
        .and_then(|b| b.message.or(b.name))
        .unwrap_or_else(|| text.to_string());
    PaymentError::Api {
        provider: "paypal",
        status,
        message,
    }
}

fn outcome_for(order: OrderResponse) -> ChargeOutcome {
    let capture = order
        .purchase_units
        .into_iter()
        .filter_map(|unit| unit.payments)
        .flat_map(|payments| payments.captures)
        .next();

    match (order.status.as_str(), capture) {
        ("COMPLETED", Some(capture)) if capture.status == "COMPLETED" => ChargeOutcome::Paid {
            reference: PaymentReference::PayPal(capture.id),
        },
        (_, Some(capture)) if capture.status == "PENDING" => ChargeOutcome::Pending {
            reference: PaymentReference::PayPal(capture.id),
        },
        (status, _) => ChargeOutcome::Declined {
            reason: format!("PayPal order {} not captured ({status})", order.id),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(json: &str) -> OrderResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_completed_capture_is_paid() {
        let outcome = outcome_for(order(
            r#"{"id":"O-1","status":"COMPLETED","purchase_units":[
                {"payments":{"captures":[{"id":"CAP-1","status":"COMPLETED"}]}}
            ]}"#,
        ));
        match outcome {
            ChargeOutcome::Paid { reference } => {
                assert_eq!(reference, PaymentReference::PayPal("CAP-1".to_string()));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_pending_capture_is_pending() {
        let outcome = outcome_for(order(
            r#"{"id":"O-2","status":"COMPLETED","purchase_units":[
                {"payments":{"captures":[{"id":"CAP-2","status":"PENDING"}]}}
            ]}"#,
        ));
        assert!(matches!(outcome, ChargeOutcome::Pending { .. }));
    }

    #[test]
    fn test_uncaptured_order_is_declined() {
        let outcome = outcome_for(order(r#"{"id":"O-3","status":"PAYER_ACTION_REQUIRED"}"#));
        assert!(matches!(outcome, ChargeOutcome::Declined { .. }));
    }

    #[test]
    fn test_api_error_prefers_message() {
        let err = api_error(
            401,
            r#"{"name":"AUTHENTICATION_FAILURE","message":"Authentication failed"}"#,
        );
        assert_eq!(
            err.to_string(),
            "paypal API error (401): Authentication failed"
        );
    }
}
