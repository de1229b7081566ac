//! Request and response shapes of the Cognito JSON API.

use befit_core::Email;
use serde::{Deserialize, Serialize};

/// Tokens handed to the client after login or refresh.
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// The identity behind a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityUser {
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

impl IdentityUser {
    /// The email a local account may be linked by. Only verified addresses count.
    #[must_use]
    pub fn linkable_email(&self) -> Option<Email> {
        if !self.email_verified {
            return None;
        }
        self.email.as_deref().and_then(|e| Email::parse(e).ok())
    }
}

/// A `Name`/`Value` user attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SignUpResponse {
    pub user_sub: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InitiateAuthResponse {
    pub authentication_result: Option<AuthenticationResult>,
    pub challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AuthenticationResult {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetUserResponse {
    pub username: String,
    #[serde(default)]
    pub user_attributes: Vec<Attribute>,
}

impl GetUserResponse {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.user_attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn into_user(self) -> IdentityUser {
        let sub = self.attribute("sub").map_or_else(|| self.username.clone(), String::from);
        let email = self.attribute("email").map(String::from);
        let email_verified = self.attribute("email_verified") == Some("true");
        IdentityUser {
            sub,
            email,
            email_verified,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_get_user_response_into_user() {
        let json = r#"{
            "Username": "a1b2",
            "UserAttributes": [
                {"Name": "sub", "Value": "0f6c-sub"},
                {"Name": "email", "Value": "ana@example.com"},
                {"Name": "email_verified", "Value": "true"}
            ]
        }"#;
        let response: GetUserResponse = serde_json::from_str(json).unwrap();
        let user = response.into_user();
        assert_eq!(user.sub, "0f6c-sub");
        assert_eq!(user.email.as_deref(), Some("ana@example.com"));
        assert!(user.email_verified);
    }

    #[test]
    fn test_get_user_falls_back_to_username() {
        let json = r#"{"Username": "a1b2"}"#;
        let response: GetUserResponse = serde_json::from_str(json).unwrap();
        let user = response.into_user();
        assert_eq!(user.sub, "a1b2");
        assert_eq!(user.email, None);
        assert!(!user.email_verified);
    }

    #[test]
    fn test_only_verified_email_links_an_account() {
        let json = r#"{
            "Username": "a1b2",
            "UserAttributes": [
                {"Name": "email", "Value": "Admin@BeFit.example"},
                {"Name": "email_verified", "Value": "false"}
            ]
        }"#;
        let response: GetUserResponse = serde_json::from_str(json).unwrap();
        let unverified = response.into_user();
        assert_eq!(unverified.linkable_email(), None);

        let verified = IdentityUser {
            email_verified: true,
            ..unverified
        };
        assert_eq!(
            verified.linkable_email().unwrap().as_str(),
            "admin@befit.example"
        );

        let malformed = IdentityUser {
            sub: "a1b2".to_string(),
            email: Some("not-an-email".to_string()),
            email_verified: true,
        };
        assert_eq!(malformed.linkable_email(), None);
    }

    #[test]
    fn test_challenge_without_tokens() {
        let json = r#"{"ChallengeName": "NEW_PASSWORD_REQUIRED", "Session": "xyz"}"#;
        let response: InitiateAuthResponse = serde_json::from_str(json).unwrap();
        assert!(response.authentication_result.is_none());
        assert_eq!(response.challenge_name.as_deref(), Some("NEW_PASSWORD_REQUIRED"));
    }
}
