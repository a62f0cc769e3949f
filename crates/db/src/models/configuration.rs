//! Configuration row entity: one persisted `(name, value, scope, scope_id)`
//! tuple backing a setting. Many rows may back one setting across scopes;
//! scope resolution happens in `vmdiag_core::query`.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vmdiag_core::error::CoreError;
use vmdiag_core::query::PersistedRow;
use vmdiag_core::settings::SettingScope;
use vmdiag_core::types::{DbId, Timestamp};

/// A row from the `configuration` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConfigurationRow {
    pub id: DbId,
    pub name: String,
    pub value: String,
    pub scope: String,
    pub scope_id: Option<DbId>,
    pub updated_at: Timestamp,
}

impl ConfigurationRow {
    /// Project into the core overlay type. Fails on an unknown scope name
    /// (a row written by a newer release, for instance).
    pub fn to_persisted(&self) -> Result<PersistedRow, CoreError> {
        Ok(PersistedRow {
            name: self.name.clone(),
            value: self.value.clone(),
            scope: SettingScope::from_name(&self.scope)?,
            scope_id: self.scope_id,
        })
    }
}

/// DTO for inserting or updating a configuration row.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertConfiguration {
    pub name: String,
    pub value: String,
    /// Defaults to `global` when absent.
    pub scope: Option<String>,
    pub scope_id: Option<DbId>,
}
