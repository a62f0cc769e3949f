//! Inventory collaborator backed by the `managed_vms` table.

use async_trait::async_trait;
use uuid::Uuid;
use vmdiag_db::repositories::ManagedVmRepo;
use vmdiag_db::DbPool;
use vmdiag_service::collaborators::{Inventory, InventoryError};

/// [`Inventory`] that resolves roles from the database.
pub struct DbInventory {
    pool: DbPool,
}

impl DbInventory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Inventory for DbInventory {
    async fn role_of(&self, target_id: Uuid) -> Result<String, InventoryError> {
        match ManagedVmRepo::find_role(&self.pool, target_id).await {
            Ok(Some(role)) => Ok(role),
            Ok(None) => Err(InventoryError::NotFound(target_id)),
            Err(e) => Err(InventoryError::Unavailable(e.to_string())),
        }
    }
}
