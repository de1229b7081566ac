//! CLI command implementations.

pub mod admin;
pub mod jobs;
pub mod migrate;
pub mod seed;

use befit_api::db::{self, RepositoryError};
use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Environment variable holding the `PostgreSQL` connection string.
pub const DATABASE_URL_VAR: &str = "BEFIT_DATABASE_URL";

/// Errors shared by the database-backed commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository query failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Connect using `BEFIT_DATABASE_URL` (or `DATABASE_URL`) only.
///
/// Commands that do not talk to external services must not require the
/// full API configuration.
pub async fn connect() -> Result<PgPool, CommandError> {
    let database_url = std::env::var(DATABASE_URL_VAR)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar(DATABASE_URL_VAR))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}
