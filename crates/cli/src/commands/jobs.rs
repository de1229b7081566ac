//! Scheduled maintenance jobs, meant to run from cron once a day.
//!
//! ```bash
//! befit loyalty expire
//! befit subscriptions renew
//! ```
//!
//! `loyalty expire` only needs `BEFIT_DATABASE_URL`. `subscriptions renew`
//! charges cards, so it loads the full API configuration for the payment
//! gateway credentials.

use befit_api::config::{ApiConfig, ConfigError};
use befit_api::db;
use befit_api::error::AppError;
use befit_api::payments::{PaymentError, PaymentGateways};
use befit_api::services::subscriptions::today;
use befit_api::services::{LoyaltyService, SubscriptionService};
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur while running a job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Payment gateway clients could not be built.
    #[error("Payment gateway error: {0}")]
    Payments(#[from] PaymentError),

    /// The job itself failed.
    #[error("Job failed: {0}")]
    App(#[from] AppError),
}

/// Expire loyalty points whose expiry date has passed.
pub async fn expire_points() -> Result<(), JobError> {
    let pool = connect().await?;
    let report = LoyaltyService::new(&pool).expire_all(today()).await?;

    tracing::info!(
        users = report.users_affected,
        points = report.total_expired_points,
        "Loyalty points expired"
    );
    Ok(())
}

/// Charge every active subscription due today.
pub async fn renew_subscriptions() -> Result<(), JobError> {
    let config = ApiConfig::from_env()?;
    let pool = db::create_pool(&config.database_url)
        .await
        .map_err(CommandError::from)?;
    let payments = PaymentGateways::new(&config)?;

    let report = SubscriptionService::new(&pool, &payments)
        .renew_due(today())
        .await?;

    tracing::info!(
        processed = report.processed,
        renewed = report.renewed,
        failed = report.failed,
        paused = report.paused,
        "Subscription renewal complete"
    );
    Ok(())
}
