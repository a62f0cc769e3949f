//! GC configuration source backed by the `configuration` table.
//!
//! The GC loop re-reads its parameters every tick, so operator changes to
//! the global settings take effect without a restart.

use async_trait::async_trait;
use vmdiag_core::error::CoreError;
use vmdiag_core::resolver;
use vmdiag_db::DbPool;
use vmdiag_service::gc::{GcConfig, GcConfigSource};

use crate::settings::load_effective_settings;

/// [`GcConfigSource`] resolving global-scope settings on each tick.
pub struct DbGcConfigSource {
    pool: DbPool,
}

impl DbGcConfigSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GcConfigSource for DbGcConfigSource {
    async fn current(&self) -> Result<GcConfig, CoreError> {
        let settings = load_effective_settings(&self.pool, "global", None)
            .await
            .map_err(|e| CoreError::Internal(format!("settings load failed: {e}")))?;

        // No per-request overrides here: the sweep runs with the plain
        // operator-configured values.
        let config = resolver::resolve(&std::collections::HashMap::new(), &settings)?;
        Ok(GcConfig {
            enabled: config.gc_enabled,
            interval_secs: config.gc_interval_secs,
            file_age_secs: config.file_age_secs,
            disk_disable_threshold: config.disk_disable_threshold,
            file_path: config.file_path,
        })
    }
}
