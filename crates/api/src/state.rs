//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::identity::{CognitoClient, IdentityError};
use crate::payments::{PaymentError, PaymentGateways};
use crate::storage::{S3Client, StorageError};

/// Error building one of the external clients at startup.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("identity client: {0}")]
    Identity(#[from] IdentityError),
    #[error("storage client: {0}")]
    Storage(#[from] StorageError),
    #[error("payment gateways: {0}")]
    Payment(#[from] PaymentError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    identity: CognitoClient,
    storage: S3Client,
    payments: PaymentGateways,
}

impl AppState {
    /// Build the state and every external client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client fails to build.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let identity = CognitoClient::new(&config.cognito)?;
        let storage = S3Client::new(&config.s3)?;
        let payments = PaymentGateways::new(&config)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                identity,
                storage,
                payments,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Cognito user pool client.
    #[must_use]
    pub fn identity(&self) -> &CognitoClient {
        &self.inner.identity
    }

    /// S3 bucket client for images.
    #[must_use]
    pub fn storage(&self) -> &S3Client {
        &self.inner.storage
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentGateways {
        &self.inner.payments
    }
}
