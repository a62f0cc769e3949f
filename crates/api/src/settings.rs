//! Loading the effective setting slice for a request scope.
//!
//! Combines the built-in setting definitions with the persisted rows that
//! apply to the caller's scope. Rows with an unknown scope name or an
//! unparseable value are skipped with a warning rather than failing the
//! whole load; the built-in default covers for them.

use vmdiag_core::query::{overlay_settings, PersistedRow};
use vmdiag_core::settings::{builtin_settings, Setting};
use vmdiag_db::repositories::ConfigurationRepo;
use vmdiag_db::DbPool;

/// Built-ins overlaid with the persisted rows for `(scope, scope_id)`.
pub async fn load_effective_settings(
    pool: &DbPool,
    scope: &str,
    scope_id: Option<i64>,
) -> Result<Vec<Setting>, sqlx::Error> {
    let rows = ConfigurationRepo::load_settings(pool, scope, scope_id).await?;
    Ok(overlay_settings(&builtin_settings(), &to_persisted(rows)))
}

/// Convert db rows to the core overlay input, dropping malformed rows.
pub fn to_persisted(rows: Vec<vmdiag_db::models::configuration::ConfigurationRow>) -> Vec<PersistedRow> {
    rows.into_iter()
        .filter_map(|row| match row.to_persisted() {
            Ok(persisted) => Some(persisted),
            Err(e) => {
                tracing::warn!(name = %row.name, scope = %row.scope, error = %e,
                    "Skipping configuration row with unknown scope");
                None
            }
        })
        .collect()
}
