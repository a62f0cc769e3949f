//! Background garbage collection of staged diagnostic bundles.
//!
//! A periodic sweep evicts artifacts older than the configured retention
//! age. When the staging disk is over the disable threshold the sweep
//! evicts everything it knows about, age regardless. Failed deletions stay
//! in the ledger and are retried on the next sweep.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use vmdiag_core::error::CoreError;

use crate::artifact::{ArtifactLedger, ArtifactState};
use crate::collaborators::{ArtifactStorage, CapacityProbe};

/// GC parameters for one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct GcConfig {
    pub enabled: bool,
    pub interval_secs: i64,
    pub file_age_secs: i64,
    pub disk_disable_threshold: f64,
    pub file_path: String,
}

/// Supplies the GC parameters for each tick, so operator setting changes
/// take effect on the next sweep without a restart.
#[async_trait]
pub trait GcConfigSource: Send + Sync {
    async fn current(&self) -> Result<GcConfig, CoreError>;
}

/// What one sweep did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub evicted: usize,
    pub failed: usize,
}

/// Run the GC loop until `cancel` fires.
///
/// Interval changes apply after the current tick completes. A disabled
/// config skips the sweep entirely, leaving the ledger untouched.
pub async fn run(
    ledger: ArtifactLedger,
    storage: Arc<dyn ArtifactStorage>,
    probe: Arc<dyn CapacityProbe>,
    config_source: Arc<dyn GcConfigSource>,
    cancel: CancellationToken,
) {
    tracing::info!("Diagnostics GC started");

    loop {
        let config = match config_source.current().await {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Diagnostics GC: config load failed, retrying next tick");
                GcConfig {
                    enabled: false,
                    interval_secs: 60,
                    file_age_secs: 0,
                    disk_disable_threshold: 1.0,
                    file_path: String::new(),
                }
            }
        };

        if config.enabled {
            let report = sweep(&ledger, storage.as_ref(), probe.as_ref(), &config).await;
            if report.evicted > 0 || report.failed > 0 {
                tracing::info!(
                    scanned = report.scanned,
                    evicted = report.evicted,
                    failed = report.failed,
                    "Diagnostics GC sweep finished"
                );
            } else {
                tracing::debug!(scanned = report.scanned, "Diagnostics GC sweep: nothing to evict");
            }
        } else {
            tracing::debug!("Diagnostics GC disabled, skipping sweep");
        }

        let interval = Duration::from_secs(config.interval_secs.max(1) as u64);
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Diagnostics GC stopping");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// One GC pass over the ledger.
pub async fn sweep(
    ledger: &ArtifactLedger,
    storage: &dyn ArtifactStorage,
    probe: &dyn CapacityProbe,
    config: &GcConfig,
) -> SweepReport {
    let snapshot = ledger.snapshot().await;
    let mut report = SweepReport {
        scanned: snapshot.len(),
        ..SweepReport::default()
    };

    // Pressure valve: an over-threshold staging disk makes every artifact
    // eligible regardless of age.
    let evict_all = match probe.utilization_at(&config.file_path).await {
        Ok(utilization) if utilization > config.disk_disable_threshold => {
            tracing::warn!(
                utilization,
                threshold = config.disk_disable_threshold,
                "Staging disk over threshold, evicting all staged artifacts"
            );
            true
        }
        Ok(_) => false,
        Err(e) => {
            tracing::error!(error = %e, "Disk probe failed during GC sweep");
            false
        }
    };

    let now = Utc::now();
    for (artifact, state) in snapshot {
        let aged_out = (now - artifact.created_at).num_seconds() >= config.file_age_secs;
        let eligible = evict_all || aged_out || state == ArtifactState::Eligible;
        if !eligible {
            continue;
        }
        ledger.mark_eligible(artifact.id).await;

        match storage.delete(&artifact.location).await {
            Ok(()) => {
                ledger.remove(artifact.id).await;
                report.evicted += 1;
                tracing::debug!(
                    artifact_id = %artifact.id,
                    location = %artifact.location,
                    "Evicted staged artifact"
                );
            }
            Err(e) => {
                // Stays Eligible; the next sweep retries it.
                report.failed += 1;
                tracing::error!(
                    artifact_id = %artifact.id,
                    location = %artifact.location,
                    error = %e,
                    "Artifact eviction failed"
                );
            }
        }
    }

    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use uuid::Uuid;

    use super::*;
    use crate::collaborators::StorageError;

    struct FakeStorage {
        deleted: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    impl FakeStorage {
        fn new() -> Self {
            Self {
                deleted: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ArtifactStorage for FakeStorage {
        async fn delete(&self, location: &str) -> Result<(), StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError {
                    location: location.to_string(),
                    reason: "permission denied".to_string(),
                });
            }
            self.deleted.lock().unwrap().push(location.to_string());
            Ok(())
        }
    }

    struct FixedProbe {
        utilization: f64,
    }

    #[async_trait]
    impl CapacityProbe for FixedProbe {
        async fn utilization_at(&self, _path: &str) -> Result<f64, StorageError> {
            Ok(self.utilization)
        }
    }

    fn config(file_age_secs: i64) -> GcConfig {
        GcConfig {
            enabled: true,
            interval_secs: 60,
            file_age_secs,
            disk_disable_threshold: 0.95,
            file_path: "/tmp/diag".to_string(),
        }
    }

    // Artifacts cannot be backdated through the ledger API, so tests use an
    // age threshold of 0 when they need "aged out" semantics.
    async fn stage(ledger: &ArtifactLedger) -> Uuid {
        ledger
            .record(
                Uuid::new_v4(),
                None,
                vec!["x".to_string()],
                format!("/tmp/diag/{}.tar", Uuid::new_v4()),
            )
            .await
            .id
    }

    #[tokio::test]
    async fn aged_artifacts_are_evicted() {
        let ledger = ArtifactLedger::new();
        stage(&ledger).await;
        let storage = FakeStorage::new();
        let probe = FixedProbe { utilization: 0.1 };

        // Age threshold 0: everything just recorded is already aged out.
        let report = sweep(&ledger, &storage, &probe, &config(0)).await;

        assert_eq!(report, SweepReport { scanned: 1, evicted: 1, failed: 0 });
        assert!(ledger.is_empty().await);
        assert_eq!(storage.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn young_artifacts_survive() {
        let ledger = ArtifactLedger::new();
        stage(&ledger).await;
        let storage = FakeStorage::new();
        let probe = FixedProbe { utilization: 0.1 };

        let report = sweep(&ledger, &storage, &probe, &config(86_400)).await;

        assert_eq!(report, SweepReport { scanned: 1, evicted: 0, failed: 0 });
        assert_eq!(ledger.len().await, 1);
        assert!(storage.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn over_threshold_disk_evicts_young_artifacts_too() {
        let ledger = ArtifactLedger::new();
        stage(&ledger).await;
        stage(&ledger).await;
        let storage = FakeStorage::new();
        let probe = FixedProbe { utilization: 0.99 };

        let report = sweep(&ledger, &storage, &probe, &config(86_400)).await;

        assert_eq!(report, SweepReport { scanned: 2, evicted: 2, failed: 0 });
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn failed_delete_stays_for_retry() {
        let ledger = ArtifactLedger::new();
        let id = stage(&ledger).await;
        let storage = FakeStorage::new();
        storage.fail.store(true, Ordering::SeqCst);
        let probe = FixedProbe { utilization: 0.1 };

        let report = sweep(&ledger, &storage, &probe, &config(0)).await;
        assert_eq!(report, SweepReport { scanned: 1, evicted: 0, failed: 1 });
        assert_eq!(ledger.len().await, 1);
        let states: HashSet<ArtifactState> =
            ledger.snapshot().await.into_iter().map(|(_, s)| s).collect();
        assert_eq!(states, HashSet::from([ArtifactState::Eligible]));

        // Storage recovers; the retry sweep clears it even though the age
        // threshold no longer matches.
        storage.fail.store(false, Ordering::SeqCst);
        let report = sweep(&ledger, &storage, &probe, &config(86_400)).await;
        assert_eq!(report, SweepReport { scanned: 1, evicted: 1, failed: 0 });
        assert!(ledger.is_empty().await);
        let _ = id;
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let ledger = ArtifactLedger::new();
        stage(&ledger).await;
        let storage = FakeStorage::new();
        let probe = FixedProbe { utilization: 0.1 };

        sweep(&ledger, &storage, &probe, &config(0)).await;
        let report = sweep(&ledger, &storage, &probe, &config(0)).await;

        assert_eq!(report, SweepReport::default());
        assert_eq!(storage.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disabled_gc_loop_never_sweeps() {
        struct DisabledSource;

        #[async_trait]
        impl GcConfigSource for DisabledSource {
            async fn current(&self) -> Result<GcConfig, CoreError> {
                Ok(GcConfig {
                    enabled: false,
                    ..config(0)
                })
            }
        }

        tokio::time::pause();
        let ledger = ArtifactLedger::new();
        stage(&ledger).await;
        let storage = Arc::new(FakeStorage::new());
        let probe = Arc::new(FixedProbe { utilization: 0.99 });
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(
            ledger.clone(),
            storage.clone(),
            probe,
            Arc::new(DisabledSource),
            cancel.clone(),
        ));

        tokio::time::advance(Duration::from_secs(300)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(ledger.len().await, 1);
        assert!(storage.deleted.lock().unwrap().is_empty());
    }
}
