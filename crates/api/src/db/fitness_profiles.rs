//! Fitness profile repository.

use sqlx::PgPool;

use befit_core::UserId;

use super::RepositoryError;
use crate::models::{FitnessProfile, FitnessProfileInput};

const PROFILE_COLUMNS: &str =
    "id, user_id, fitness_goal, activity_level, weight, height, attributes, created_at, updated_at";

/// Repository for fitness profile database operations.
pub struct FitnessProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FitnessProfileRepository<'a> {
    /// Create a new fitness profile repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<FitnessProfile>, RepositoryError> {
        let row = sqlx::query_as::<_, FitnessProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM befit.fitness_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Create or replace a user's profile.
    ///
    /// `attributes` must already carry the recommended plan.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        user_id: UserId,
        input: &FitnessProfileInput,
        attributes: &serde_json::Value,
    ) -> Result<FitnessProfile, RepositoryError> {
        let row = sqlx::query_as::<_, FitnessProfile>(&format!(
            r"
            INSERT INTO befit.fitness_profiles
                (user_id, fitness_goal, activity_level, weight, height, attributes)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                fitness_goal = EXCLUDED.fitness_goal,
                activity_level = EXCLUDED.activity_level,
                weight = EXCLUDED.weight,
                height = EXCLUDED.height,
                attributes = EXCLUDED.attributes
            RETURNING {PROFILE_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(input.fitness_goal.as_deref())
        .bind(input.activity_level.as_deref())
        .bind(input.weight)
        .bind(input.height)
        .bind(attributes)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }
}
