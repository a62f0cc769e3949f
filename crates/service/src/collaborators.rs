//! Async contracts for everything the orchestrator needs from the outside
//! world. Production wiring lives in [`crate::channel`], [`crate::capacity`]
//! and the API crate; tests supply in-memory fakes.

use async_trait::async_trait;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("managed VM '{0}' not found")]
    NotFound(Uuid),
    #[error("inventory unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a target VM id to its fleet role.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn role_of(&self, target_id: Uuid) -> Result<String, InventoryError>;
}

// ---------------------------------------------------------------------------
// Remote fetch
// ---------------------------------------------------------------------------

/// What the agent handed back for a retrieval.
#[derive(Debug, Clone)]
pub struct FetchedBundle {
    /// Staging-area path of the bundle on the management host.
    pub location: String,
    /// Bundle size, if the agent reported one.
    pub size_bytes: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("target unreachable: {0}")]
    Unreachable(String),
    #[error("fetch timed out")]
    Timeout,
    #[error("agent error: {0}")]
    Remote(String),
}

/// Pulls a set of diagnostic files off a target VM into the staging area.
///
/// `timeout_secs` is advisory for the transport; the orchestrator enforces
/// the hard deadline around the whole call either way.
#[async_trait]
pub trait RemoteFetch: Send + Sync {
    async fn fetch(
        &self,
        target_id: Uuid,
        files: &[String],
        timeout_secs: i64,
    ) -> Result<FetchedBundle, FetchError>;
}

// ---------------------------------------------------------------------------
// Capacity probe
// ---------------------------------------------------------------------------

/// Reports the utilization fraction (0.0..=1.0) of the filesystem holding
/// `path`. Backs the pre-flight disk guard and the GC pressure check.
#[async_trait]
pub trait CapacityProbe: Send + Sync {
    async fn utilization_at(&self, path: &str) -> Result<f64, StorageError>;
}

// ---------------------------------------------------------------------------
// Artifact storage
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
#[error("storage error at '{location}': {reason}")]
pub struct StorageError {
    pub location: String,
    pub reason: String,
}

/// Deletes staged artifact bundles. GC evictions go through here.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    async fn delete(&self, location: &str) -> Result<(), StorageError>;
}
