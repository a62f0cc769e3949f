use std::sync::Arc;

use vmdiag_core::registry::DiagnosticsKeyRegistry;
use vmdiag_service::orchestrator::RetrievalOrchestrator;
use vmdiag_service::ArtifactLedger;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: vmdiag_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// In-memory diagnostics category registry.
    pub registry: Arc<DiagnosticsKeyRegistry>,
    /// Retrieval flow driver.
    pub orchestrator: Arc<RetrievalOrchestrator>,
    /// Ledger of staged artifacts (shared with the GC loop).
    pub ledger: ArtifactLedger,
}
