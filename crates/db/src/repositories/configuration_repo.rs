//! Repository for the `configuration` table.

use sqlx::PgPool;
use vmdiag_core::types::DbId;

use crate::models::configuration::{ConfigurationRow, UpsertConfiguration};

/// Column list for `configuration` queries.
const COLUMNS: &str = "id, name, value, scope, scope_id, updated_at";

/// CRUD operations for persisted configuration rows.
pub struct ConfigurationRepo;

impl ConfigurationRepo {
    /// Load the rows applicable to a caller's scope chain: every global
    /// row plus the rows defined for exactly `(scope, scope_id)`.
    ///
    /// Scope precedence among the returned rows is applied by
    /// `vmdiag_core::query`, not here.
    pub async fn load_settings(
        pool: &PgPool,
        scope: &str,
        scope_id: Option<DbId>,
    ) -> Result<Vec<ConfigurationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM configuration
             WHERE scope = 'global'
                OR (scope = $1 AND scope_id IS NOT DISTINCT FROM $2)
             ORDER BY name"
        );
        sqlx::query_as::<_, ConfigurationRow>(&query)
            .bind(scope)
            .bind(scope_id)
            .fetch_all(pool)
            .await
    }

    /// Insert a row or update its value on `(name, scope, scope_id)` conflict.
    pub async fn upsert(
        pool: &PgPool,
        input: &UpsertConfiguration,
    ) -> Result<ConfigurationRow, sqlx::Error> {
        let scope = input.scope.as_deref().unwrap_or("global");
        let query = format!(
            "INSERT INTO configuration (name, value, scope, scope_id)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (name, scope, scope_id) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ConfigurationRow>(&query)
            .bind(&input.name)
            .bind(&input.value)
            .bind(scope)
            .bind(input.scope_id)
            .fetch_one(pool)
            .await
    }
}
