//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BEFIT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `COGNITO_REGION` - Region of the Cognito user pool
//! - `COGNITO_USER_POOL_ID` - Cognito user pool ID
//! - `COGNITO_CLIENT_ID` - Cognito app client ID
//! - `AWS_REGION` - Region of the S3 bucket
//! - `AWS_ACCESS_KEY_ID` - S3 access key ID
//! - `AWS_SECRET_ACCESS_KEY` - S3 secret access key (high entropy)
//! - `S3_BUCKET_NAME` - Bucket for profile and product images
//! - `STRIPE_SECRET_KEY` - Stripe secret API key (high entropy)
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook signing secret (high entropy)
//! - `PAYPAL_CLIENT_ID` - PayPal REST client ID
//! - `PAYPAL_CLIENT_SECRET` - PayPal REST client secret (high entropy)
//!
//! ## Optional
//! - `BEFIT_HOST` - Bind address (default: 127.0.0.1)
//! - `BEFIT_PORT` - Listen port (default: 8000)
//! - `APP_URL` - Public URL of the web client (default: <http://localhost:3000>)
//! - `BACKEND_CORS_ORIGINS` - JSON list of allowed origins (default: `APP_URL` only)
//! - `COGNITO_CLIENT_SECRET` - App client secret, when the client has one
//! - `PAYPAL_BASE_URL` - PayPal API base (default: sandbox)
//! - `BEFIT_CURRENCY` - ISO currency code charged (default: mxn)
//! - `BEFIT_TAX_RATE` - Tax rate applied to subtotals (default: 0.16)
//! - `BEFIT_FLAT_SHIPPING` - Shipping charged when no free shipping applies (default: 99.00)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.1)
//! - `DEBUG` - Enables verbose error logging (default: false)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_PAYPAL_BASE_URL: &str = "https://api-m.sandbox.paypal.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public URL of the web client
    pub app_url: String,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
    /// Managed identity provider
    pub cognito: CognitoConfig,
    /// Managed object store
    pub s3: S3Config,
    /// Card payments
    pub stripe: StripeConfig,
    /// Wallet payments
    pub paypal: PayPalConfig,
    /// Pricing policy
    pub commerce: CommerceConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions sent to Sentry
    pub sentry_traces_sample_rate: f32,
    /// Verbose error logging
    pub debug: bool,
}

/// Amazon Cognito user pool configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct CognitoConfig {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    /// Present only when the app client was created with a secret.
    pub client_secret: Option<SecretString>,
}

impl std::fmt::Debug for CognitoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CognitoConfig")
            .field("region", &self.region)
            .field("user_pool_id", &self.user_pool_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Amazon S3 bucket configuration.
#[derive(Clone)]
pub struct S3Config {
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: SecretString,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    pub webhook_secret: SecretString,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

/// PayPal REST API configuration.
#[derive(Clone)]
pub struct PayPalConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for PayPalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Pricing applied at checkout.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// Lower-case ISO 4217 code sent to the gateways.
    pub currency: String,
    pub tax_rate: Decimal,
    pub flat_shipping: Decimal,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            currency: "mxn".to_owned(),
            tax_rate: Decimal::new(16, 2),
            flat_shipping: Decimal::new(9900, 2),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BEFIT_DATABASE_URL")?;
        let host = parse_env("BEFIT_HOST", "127.0.0.1")?;
        let port = parse_env("BEFIT_PORT", "8000")?;
        let app_url = get_env_or_default("APP_URL", "http://localhost:3000");
        let cors_origins = match get_optional_env("BACKEND_CORS_ORIGINS") {
            Some(raw) => parse_cors_origins(&raw)?,
            None => vec![app_url.clone()],
        };

        Ok(Self {
            database_url,
            host,
            port,
            app_url,
            cors_origins,
            cognito: CognitoConfig::from_env()?,
            s3: S3Config::from_env()?,
            stripe: StripeConfig::from_env()?,
            paypal: PayPalConfig::from_env()?,
            commerce: CommerceConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
            debug: matches!(
                get_env_or_default("DEBUG", "false").to_lowercase().as_str(),
                "1" | "true" | "yes"
            ),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CognitoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            region: get_required_env("COGNITO_REGION")?,
            user_pool_id: get_required_env("COGNITO_USER_POOL_ID")?,
            client_id: get_required_env("COGNITO_CLIENT_ID")?,
            client_secret: get_optional_env("COGNITO_CLIENT_SECRET").map(SecretString::from),
        })
    }
}

impl S3Config {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            region: get_required_env("AWS_REGION")?,
            bucket: get_required_env("S3_BUCKET_NAME")?,
            access_key_id: get_required_env("AWS_ACCESS_KEY_ID")?,
            secret_access_key: get_validated_secret("AWS_SECRET_ACCESS_KEY")?,
        })
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_validated_secret("STRIPE_WEBHOOK_SECRET")?,
        })
    }
}

impl PayPalConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_env_or_default("PAYPAL_BASE_URL", DEFAULT_PAYPAL_BASE_URL)
                .trim_end_matches('/')
                .to_owned(),
            client_id: get_required_env("PAYPAL_CLIENT_ID")?,
            client_secret: get_validated_secret("PAYPAL_CLIENT_SECRET")?,
        })
    }
}

impl CommerceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let tax_rate: Decimal = parse_env("BEFIT_TAX_RATE", &defaults.tax_rate.to_string())?;
        if tax_rate < Decimal::ZERO || tax_rate >= Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar(
                "BEFIT_TAX_RATE".to_string(),
                "must be in [0, 1)".to_string(),
            ));
        }
        let flat_shipping: Decimal =
            parse_env("BEFIT_FLAT_SHIPPING", &defaults.flat_shipping.to_string())?;
        if flat_shipping < Decimal::ZERO {
            return Err(ConfigError::InvalidEnvVar(
                "BEFIT_FLAT_SHIPPING".to_string(),
                "must not be negative".to_string(),
            ));
        }

        Ok(Self {
            currency: get_env_or_default("BEFIT_CURRENCY", &defaults.currency).to_lowercase(),
            tax_rate,
            flat_shipping,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse `BACKEND_CORS_ORIGINS`, a JSON array of origin strings.
fn parse_cors_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = serde_json::from_str(raw).map_err(|e| {
        ConfigError::InvalidEnvVar("BACKEND_CORS_ORIGINS".to_string(), e.to_string())
    })?;
    Ok(origins
        .into_iter()
        .map(|o| o.trim().trim_end_matches('/').to_owned())
        .filter(|o| !o.is_empty())
        .collect())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_stripe_style_key_passes() {
        let result = validate_secret_strength(
            "sk_test_51NfQ2bKx7Lm9Vw3TzR8yHc4Pd6Ej0Ug",
            "STRIPE_SECRET_KEY",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_placeholder_rejected() {
        let result = validate_secret_strength("your-stripe-key", "STRIPE_SECRET_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_low_entropy_rejected() {
        let result = validate_secret_strength("abababababababababab", "PAYPAL_CLIENT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_cors_origins_parse_json_list() {
        let origins =
            parse_cors_origins(r#"["http://localhost:3000/", " https://befit.mx "]"#).unwrap();
        assert_eq!(origins, vec!["http://localhost:3000", "https://befit.mx"]);
    }

    #[test]
    fn test_cors_origins_reject_non_list() {
        assert!(matches!(
            parse_cors_origins("http://localhost:3000"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_commerce_defaults() {
        let commerce = CommerceConfig::default();
        assert_eq!(commerce.currency, "mxn");
        assert_eq!(commerce.tax_rate.to_string(), "0.16");
        assert_eq!(commerce.flat_shipping.to_string(), "99.00");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let stripe = StripeConfig {
            secret_key: SecretString::from("sk_live_supersecretvalue"),
            webhook_secret: SecretString::from("whsec_supersecretvalue"),
        };
        let s3 = S3Config {
            region: "us-east-1".to_string(),
            bucket: "befit-images".to_string(),
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: SecretString::from("aws_supersecretvalue"),
        };

        let output = format!("{stripe:?} {s3:?}");
        assert!(output.contains("befit-images"));
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("supersecretvalue"));
    }

    #[test]
    fn test_cognito_debug_without_secret() {
        let cognito = CognitoConfig {
            region: "us-east-1".to_string(),
            user_pool_id: "us-east-1_Abc123".to_string(),
            client_id: "client123".to_string(),
            client_secret: None,
        };
        let output = format!("{cognito:?}");
        assert!(output.contains("client_secret: None"));
    }
}
