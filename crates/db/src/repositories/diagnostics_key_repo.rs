//! Repository for the `diagnostics_keys` table.

use sqlx::PgPool;
use vmdiag_core::registry::DiagnosticsKey;

use crate::models::diagnostics_key::DiagnosticsKeyRow;

/// Column list for `diagnostics_keys` queries.
const COLUMNS: &str = "id, role, category, default_detail, description, created_at, updated_at";

/// CRUD operations for persisted diagnostics category definitions.
pub struct DiagnosticsKeyRepo;

impl DiagnosticsKeyRepo {
    /// Rows matching a role and category (at most one, given the unique
    /// constraint; returned as a list to match the lookup contract).
    pub async fn find_by_role_and_category(
        pool: &PgPool,
        role: &str,
        category: &str,
    ) -> Result<Vec<DiagnosticsKeyRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM diagnostics_keys WHERE role = $1 AND category = $2");
        sqlx::query_as::<_, DiagnosticsKeyRow>(&query)
            .bind(role)
            .bind(category)
            .fetch_all(pool)
            .await
    }

    /// All stored definitions, ordered by role then category.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<DiagnosticsKeyRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM diagnostics_keys ORDER BY role, category");
        sqlx::query_as::<_, DiagnosticsKeyRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Insert a definition or replace its detail and description on
    /// `(role, category)` conflict — the persisted mirror of the registry's
    /// latest-definition-wins upsert.
    pub async fn upsert(pool: &PgPool, key: &DiagnosticsKey) -> Result<DiagnosticsKeyRow, sqlx::Error> {
        let detail = serde_json::to_value(&key.default_detail)
            .unwrap_or_else(|_| serde_json::json!([]));
        let query = format!(
            "INSERT INTO diagnostics_keys (role, category, default_detail, description)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (role, category) DO UPDATE SET
                default_detail = EXCLUDED.default_detail,
                description = EXCLUDED.description,
                updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DiagnosticsKeyRow>(&query)
            .bind(&key.role)
            .bind(&key.category)
            .bind(&detail)
            .bind(&key.description)
            .fetch_one(pool)
            .await
    }
}
