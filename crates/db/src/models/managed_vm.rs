//! Managed VM inventory entity. The orchestrator only needs the role, but
//! the full row is exposed for listing and ops tooling.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;
use vmdiag_core::types::Timestamp;

/// A row from the `managed_vms` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ManagedVm {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub state: String,
    pub created_at: Timestamp,
}
