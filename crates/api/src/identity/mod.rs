//! Amazon Cognito client for sign-up, login, and token verification.
//!
//! Talks to the Cognito Identity Provider JSON API directly:
//!
//! - Endpoint: `https://cognito-idp.{region}.amazonaws.com/`
//! - Operation selected by the `X-Amz-Target` header
//! - Body `application/x-amz-json-1.1`
//!
//! When the app client has a secret, every username-bearing call carries
//! `SECRET_HASH = base64(HMAC-SHA256(secret, username + client_id))`.
//!
//! Access tokens are verified with `GetUser`; results are cached for 5 minutes
//! keyed by the SHA-256 of the token, so a raw token never sits in memory as a key.

mod error;
mod types;

pub use error::IdentityError;
pub use types::{Attribute, AuthTokens, IdentityUser};

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::config::CognitoConfig;

use error::ApiErrorResponse;
use types::{GetUserResponse, InitiateAuthResponse, SignUpResponse};

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const TOKEN_CACHE_TTL: Duration = Duration::from_secs(300);

/// Compute the Cognito `SECRET_HASH` for a username.
#[must_use]
pub fn secret_hash(client_secret: &str, username: &str, client_id: &str) -> String {
    // HMAC accepts keys of any length
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(client_secret.as_bytes()) else {
        return String::new();
    };
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Cognito user pool client.
#[derive(Clone)]
pub struct CognitoClient {
    inner: Arc<CognitoClientInner>,
}

struct CognitoClientInner {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: Option<SecretString>,
    token_cache: Cache<String, IdentityUser>,
}

impl CognitoClient {
    /// Create a new Cognito client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CognitoConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        let token_cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(TOKEN_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(CognitoClientInner {
                client,
                endpoint: format!("https://cognito-idp.{}.amazonaws.com/", config.region),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                token_cache,
            }),
        })
    }

    fn secret_hash_for(&self, username: &str) -> Option<String> {
        self.inner
            .client_secret
            .as_ref()
            .map(|secret| secret_hash(secret.expose_secret(), username, &self.inner.client_id))
    }

    /// Body with `ClientId`, `Username` and, when configured, `SecretHash`.
    fn user_body(&self, username: &str) -> serde_json::Map<String, Value> {
        let mut body = serde_json::Map::new();
        body.insert("ClientId".into(), json!(self.inner.client_id));
        body.insert("Username".into(), json!(username));
        if let Some(hash) = self.secret_hash_for(username) {
            body.insert("SecretHash".into(), json!(hash));
        }
        body
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        body: &Value,
    ) -> Result<T, IdentityError> {
        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header("Content-Type", "application/x-amz-json-1.1")
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(err) => {
                    debug!(action, error_type = %err.error_type, "Cognito rejected request");
                    IdentityError::from_api(&err.error_type, err.message)
                }
                Err(_) => IdentityError::Api {
                    error_type: status.to_string(),
                    message: text,
                },
            });
        }

        // Some operations answer with an empty body
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| IdentityError::Parse(e.to_string()))
    }

    /// Register a user. Returns the new user's `sub`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::UserExists` for a taken email, or the provider's error.
    #[instrument(skip(self, password, attributes))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        attributes: Vec<Attribute>,
    ) -> Result<String, IdentityError> {
        let mut body = self.user_body(email);
        body.insert("Password".into(), json!(password.expose_secret()));
        body.insert("UserAttributes".into(), json!(attributes));
        let response: SignUpResponse = self.call("SignUp", &Value::Object(body)).await?;
        Ok(response.user_sub)
    }

    /// Confirm a sign-up with the emailed code.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidCode` for a wrong or expired code.
    #[instrument(skip(self, code))]
    pub async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), IdentityError> {
        let mut body = self.user_body(email);
        body.insert("ConfirmationCode".into(), json!(code));
        let _: Value = self.call("ConfirmSignUp", &Value::Object(body)).await?;
        Ok(())
    }

    /// Send the confirmation code again.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    #[instrument(skip(self))]
    pub async fn resend_confirmation_code(&self, email: &str) -> Result<(), IdentityError> {
        let body = self.user_body(email);
        let _: Value = self
            .call("ResendConfirmationCode", &Value::Object(body))
            .await?;
        Ok(())
    }

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::NotAuthorized` for wrong credentials and
    /// `IdentityError::NotConfirmed` for unconfirmed accounts.
    #[instrument(skip(self, password))]
    pub async fn initiate_auth(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthTokens, IdentityError> {
        let mut params = serde_json::Map::new();
        params.insert("USERNAME".into(), json!(email));
        params.insert("PASSWORD".into(), json!(password.expose_secret()));
        if let Some(hash) = self.secret_hash_for(email) {
            params.insert("SECRET_HASH".into(), json!(hash));
        }

        let body = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.inner.client_id,
            "AuthParameters": params,
        });
        let response: InitiateAuthResponse = self.call("InitiateAuth", &body).await?;
        tokens_from(response, None)
    }

    /// Exchange a refresh token for new access and ID tokens.
    ///
    /// `username` is needed for the secret hash when the app client has a secret.
    /// The returned refresh token is the one supplied.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::NotAuthorized` for an invalid or revoked token.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(
        &self,
        refresh_token: &str,
        username: Option<&str>,
    ) -> Result<AuthTokens, IdentityError> {
        let mut params = serde_json::Map::new();
        params.insert("REFRESH_TOKEN".into(), json!(refresh_token));
        if let Some(hash) = username.and_then(|name| self.secret_hash_for(name)) {
            params.insert("SECRET_HASH".into(), json!(hash));
        }

        let body = json!({
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "ClientId": self.inner.client_id,
            "AuthParameters": params,
        });
        let response: InitiateAuthResponse = self.call("InitiateAuth", &body).await?;
        tokens_from(response, Some(refresh_token))
    }

    /// Revoke every token of the user and drop the cached verification.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    #[instrument(skip(self, access_token))]
    pub async fn global_sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let _: Value = self
            .call("GlobalSignOut", &json!({ "AccessToken": access_token }))
            .await?;
        self.inner.token_cache.invalidate(&token_key(access_token)).await;
        Ok(())
    }

    /// Start a password reset; the provider emails a code.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<(), IdentityError> {
        let body = self.user_body(email);
        let _: Value = self.call("ForgotPassword", &Value::Object(body)).await?;
        Ok(())
    }

    /// Finish a password reset.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidCode` or `IdentityError::InvalidPassword`.
    #[instrument(skip(self, code, new_password))]
    pub async fn confirm_forgot_password(
        &self,
        email: &str,
        code: &str,
        new_password: &SecretString,
    ) -> Result<(), IdentityError> {
        let mut body = self.user_body(email);
        body.insert("ConfirmationCode".into(), json!(code));
        body.insert("Password".into(), json!(new_password.expose_secret()));
        let _: Value = self
            .call("ConfirmForgotPassword", &Value::Object(body))
            .await?;
        Ok(())
    }

    /// Change the password of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::NotAuthorized` when the old password is wrong.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        access_token: &str,
        old_password: &SecretString,
        new_password: &SecretString,
    ) -> Result<(), IdentityError> {
        let body = json!({
            "AccessToken": access_token,
            "PreviousPassword": old_password.expose_secret(),
            "ProposedPassword": new_password.expose_secret(),
        });
        let _: Value = self.call("ChangePassword", &body).await?;
        Ok(())
    }

    /// Verify an access token and return its identity.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::NotAuthorized` for invalid or expired tokens.
    #[instrument(skip_all)]
    pub async fn get_user(&self, access_token: &str) -> Result<IdentityUser, IdentityError> {
        let key = token_key(access_token);
        if let Some(user) = self.inner.token_cache.get(&key).await {
            return Ok(user);
        }

        let response: GetUserResponse = self
            .call("GetUser", &json!({ "AccessToken": access_token }))
            .await?;
        let user = response.into_user();
        self.inner.token_cache.insert(key, user.clone()).await;
        Ok(user)
    }
}

fn token_key(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn tokens_from(
    response: InitiateAuthResponse,
    supplied_refresh: Option<&str>,
) -> Result<AuthTokens, IdentityError> {
    let Some(result) = response.authentication_result else {
        let challenge = response.challenge_name.unwrap_or_else(|| "unknown".to_string());
        return Err(IdentityError::NotAuthorized(format!(
            "additional challenge required: {challenge}"
        )));
    };

    let refresh_token = supplied_refresh
        .map(String::from)
        .or(result.refresh_token)
        .ok_or_else(|| IdentityError::Parse("missing refresh token".to_string()))?;

    Ok(AuthTokens {
        access_token: result.access_token,
        id_token: result.id_token,
        refresh_token,
        expires_in: result.expires_in,
        token_type: result.token_type.unwrap_or_else(|| "Bearer".to_string()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_hash_is_base64_hmac() {
        let hash = secret_hash("secret", "ana@example.com", "client123");
        let bytes = BASE64.decode(&hash).unwrap();
        assert_eq!(bytes.len(), 32);

        // Same inputs, same hash; different username, different hash
        assert_eq!(hash, secret_hash("secret", "ana@example.com", "client123"));
        assert_ne!(hash, secret_hash("secret", "bob@example.com", "client123"));
    }

    #[test]
    fn test_token_key_hides_token() {
        let key = token_key("eyJraWQiOi.token");
        assert_eq!(key.len(), 64);
        assert!(!key.contains("eyJ"));
    }

    #[test]
    fn test_tokens_from_reuses_supplied_refresh_token() {
        let response: InitiateAuthResponse = serde_json::from_str(
            r#"{"AuthenticationResult": {
                "AccessToken": "a", "IdToken": "i", "ExpiresIn": 3600, "TokenType": "Bearer"
            }}"#,
        )
        .unwrap();
        let tokens = tokens_from(response, Some("r-old")).unwrap();
        assert_eq!(tokens.refresh_token, "r-old");
        assert_eq!(tokens.expires_in, 3600);
        assert_eq!(tokens.token_type, "Bearer");
    }

    #[test]
    fn test_tokens_from_challenge_is_not_authorized() {
        let response: InitiateAuthResponse =
            serde_json::from_str(r#"{"ChallengeName": "SMS_MFA"}"#).unwrap();
        let err = tokens_from(response, None).unwrap_err();
        assert!(matches!(err, IdentityError::NotAuthorized(_)));
    }
}
