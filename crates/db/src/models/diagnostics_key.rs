//! Diagnostics key row entity: the persisted form of a per-role category
//! definition. `default_detail` is stored as a JSONB array of file names.

use serde::Serialize;
use sqlx::FromRow;
use vmdiag_core::registry::DiagnosticsKey;
use vmdiag_core::types::{DbId, Timestamp};

/// A row from the `diagnostics_keys` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DiagnosticsKeyRow {
    pub id: DbId,
    pub role: String,
    pub category: String,
    pub default_detail: serde_json::Value,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl DiagnosticsKeyRow {
    /// Convert into the in-memory registry key. Non-string entries in the
    /// stored array are skipped rather than failing hydration.
    pub fn to_key(&self) -> DiagnosticsKey {
        let default_detail = self
            .default_detail
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        DiagnosticsKey {
            role: self.role.clone(),
            category: self.category.clone(),
            default_detail,
            description: self.description.clone(),
        }
    }
}
