//! Error types for the Cognito client.

use axum::http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Wrong credentials or an invalid token.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Account exists but the email is not confirmed.
    #[error("user is not confirmed")]
    NotConfirmed,

    /// An account with this email already exists.
    #[error("user already exists")]
    UserExists,

    /// Confirmation or reset code is wrong or expired.
    #[error("invalid code: {0}")]
    InvalidCode(String),

    /// Password does not satisfy the pool policy.
    #[error("invalid password: {0}")]
    InvalidPassword(String),

    /// A request parameter was rejected.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Too many requests for this user or client.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other provider error.
    #[error("API error ({error_type}): {message}")]
    Api {
        /// Exception name without the namespace.
        error_type: String,
        /// Error message.
        message: String,
    },

    /// Failed to parse a response.
    #[error("parse error: {0}")]
    Parse(String),
}

impl IdentityError {
    /// Map a Cognito `__type` and message to an error.
    pub(crate) fn from_api(error_type: &str, message: String) -> Self {
        // Types may arrive namespaced, e.g. "com.amazonaws...#NotAuthorizedException"
        let name = error_type.rsplit('#').next().unwrap_or(error_type);
        match name {
            "NotAuthorizedException" | "UserNotFoundException" => Self::NotAuthorized(message),
            "UserNotConfirmedException" => Self::NotConfirmed,
            "UsernameExistsException" | "AliasExistsException" => Self::UserExists,
            "CodeMismatchException" | "ExpiredCodeException" => Self::InvalidCode(message),
            "InvalidPasswordException" => Self::InvalidPassword(message),
            "InvalidParameterException" => Self::InvalidParameter(message),
            "LimitExceededException" | "TooManyRequestsException"
            | "TooManyFailedAttemptsException" => Self::RateLimited(message),
            _ => Self::Api {
                error_type: name.to_string(),
                message,
            },
        }
    }

    /// HTTP status to answer with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotAuthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotConfirmed => StatusCode::FORBIDDEN,
            Self::UserExists => StatusCode::CONFLICT,
            Self::InvalidCode(_) | Self::InvalidPassword(_) | Self::InvalidParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Http(_) | Self::Api { .. } | Self::Parse(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message safe to show the client.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::NotAuthorized(_) => "Invalid credentials or token".to_string(),
            Self::NotConfirmed => "User is not confirmed. Check your email for the code".to_string(),
            Self::UserExists => "Email already registered".to_string(),
            Self::InvalidCode(_) => "Invalid or expired code".to_string(),
            Self::InvalidPassword(msg) | Self::InvalidParameter(msg) => msg.clone(),
            Self::RateLimited(_) => "Too many attempts, try again later".to_string(),
            Self::Http(_) | Self::Api { .. } | Self::Parse(_) => {
                "External service error".to_string()
            }
        }
    }
}

/// Error body returned by the Cognito JSON API.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(rename = "__type")]
    pub error_type: String,
    #[serde(default, alias = "Message")]
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_api_maps_known_exceptions() {
        let err = IdentityError::from_api("NotAuthorizedException", "bad".to_string());
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = IdentityError::from_api("UserNotConfirmedException", String::new());
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = IdentityError::from_api("UsernameExistsException", String::new());
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = IdentityError::from_api("ExpiredCodeException", String::new());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = IdentityError::from_api("LimitExceededException", String::new());
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_from_api_strips_namespace() {
        let err = IdentityError::from_api(
            "com.amazonaws.cognito#InvalidPasswordException",
            "Password must have symbols".to_string(),
        );
        assert!(matches!(err, IdentityError::InvalidPassword(_)));
        assert_eq!(err.client_message(), "Password must have symbols");
    }

    #[test]
    fn test_unknown_exception_is_bad_gateway() {
        let err = IdentityError::from_api("InternalErrorException", "boom".to_string());
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.client_message(), "External service error");
    }

    #[test]
    fn test_api_error_deserialization() {
        let json = r#"{"__type":"CodeMismatchException","message":"Invalid code"}"#;
        let body: ApiErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.error_type, "CodeMismatchException");
        assert_eq!(body.message, "Invalid code");
    }
}
