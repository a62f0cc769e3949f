//! Repository for the `managed_vms` inventory table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::managed_vm::ManagedVm;

/// Column list for `managed_vms` queries.
const COLUMNS: &str = "id, name, role, state, created_at";

/// Read access to the managed VM inventory.
pub struct ManagedVmRepo;

impl ManagedVmRepo {
    /// Find a managed VM by its UUID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ManagedVm>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM managed_vms WHERE id = $1");
        sqlx::query_as::<_, ManagedVm>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Role of a managed VM, if it exists.
    pub async fn find_role(pool: &PgPool, id: Uuid) -> Result<Option<String>, sqlx::Error> {
        Ok(Self::find_by_id(pool, id).await?.map(|vm| vm.role))
    }
}
