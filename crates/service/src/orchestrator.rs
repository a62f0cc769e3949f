//! End-to-end diagnostics retrieval flow.
//!
//! One `retrieve` call performs exactly one agent dispatch: resolve the
//! effective config, resolve the target's role, expand the category into a
//! file set, guard disk capacity, fetch under a hard deadline, record the
//! artifact. No retries, no coalescing of concurrent identical requests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use vmdiag_core::error::CoreError;
use vmdiag_core::fileset::merge_file_set;
use vmdiag_core::registry::DiagnosticsKeyRegistry;
use vmdiag_core::resolver::{self, EffectiveConfig};
use vmdiag_core::settings::Setting;

use crate::artifact::{ArtifactLedger, RetrievedArtifact};
use crate::collaborators::{
    CapacityProbe, FetchError, FetchedBundle, Inventory, InventoryError, RemoteFetch,
};

/// One diagnostics retrieval request.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub target_id: Uuid,
    /// Registered category to pull. `None` pulls the defaults of every
    /// category registered for the target's role.
    pub category: Option<String>,
    /// Extra files appended after the category defaults.
    pub extra_files: Vec<String>,
    /// Per-request setting overrides, keyed by short override name.
    pub overrides: HashMap<String, String>,
}

/// Drives a single retrieval from request to staged artifact.
pub struct RetrievalOrchestrator {
    inventory: Arc<dyn Inventory>,
    fetch: Arc<dyn RemoteFetch>,
    probe: Arc<dyn CapacityProbe>,
    registry: Arc<DiagnosticsKeyRegistry>,
    ledger: ArtifactLedger,
}

impl RetrievalOrchestrator {
    pub fn new(
        inventory: Arc<dyn Inventory>,
        fetch: Arc<dyn RemoteFetch>,
        probe: Arc<dyn CapacityProbe>,
        registry: Arc<DiagnosticsKeyRegistry>,
        ledger: ArtifactLedger,
    ) -> Self {
        Self {
            inventory,
            fetch,
            probe,
            registry,
            ledger,
        }
    }

    /// Ledger the orchestrator records artifacts into.
    pub fn ledger(&self) -> &ArtifactLedger {
        &self.ledger
    }

    /// Retrieve diagnostics from one target VM.
    ///
    /// `settings` is the caller's already-overlaid setting slice; request
    /// overrides are applied on top of it before anything else happens.
    pub async fn retrieve(
        &self,
        request: RetrievalRequest,
        settings: &[Setting],
    ) -> Result<RetrievedArtifact, CoreError> {
        let config = resolver::resolve(&request.overrides, settings)?;

        let role = match self.inventory.role_of(request.target_id).await {
            Ok(role) => role,
            Err(InventoryError::NotFound(id)) => {
                return Err(CoreError::InvalidParameter {
                    param: "target_id".to_string(),
                    reason: format!("managed VM '{id}' not found"),
                });
            }
            Err(InventoryError::Unavailable(reason)) => {
                return Err(CoreError::Internal(format!("inventory unavailable: {reason}")));
            }
        };

        let files = self.file_set(&role, &request)?;

        // Pre-flight disk guard: above threshold means no agent contact at all.
        let utilization = self
            .probe
            .utilization_at(&config.file_path)
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        if utilization > config.disk_disable_threshold {
            tracing::warn!(
                target_id = %request.target_id,
                utilization,
                threshold = config.disk_disable_threshold,
                "Retrieval refused: staging disk over threshold"
            );
            return Err(CoreError::CapacityExceeded {
                path: config.file_path.clone(),
                utilization,
                threshold: config.disk_disable_threshold,
            });
        }

        let bundle = self
            .dispatch(request.target_id, &files, &config)
            .await?;

        let artifact = self
            .ledger
            .record(request.target_id, request.category.clone(), files, bundle.location)
            .await;

        tracing::info!(
            target_id = %request.target_id,
            artifact_id = %artifact.id,
            category = request.category.as_deref().unwrap_or("<defaults>"),
            files = artifact.files.len(),
            "Diagnostics retrieved"
        );
        Ok(artifact)
    }

    /// Expand the request into the final ordered file list.
    ///
    /// Named category: that category's defaults. No category: the defaults
    /// of every category registered for the role, in registration order.
    /// Caller extras always append after the defaults.
    fn file_set(&self, role: &str, request: &RetrievalRequest) -> Result<Vec<String>, CoreError> {
        let defaults: Vec<String> = match &request.category {
            Some(category) => {
                let key = self.registry.lookup(role, category).ok_or_else(|| {
                    CoreError::InvalidParameter {
                        param: "category".to_string(),
                        reason: format!(
                            "unknown diagnostics category '{category}' for role '{role}'"
                        ),
                    }
                })?;
                key.default_detail
            }
            None => self
                .registry
                .defaults_for_role(role)
                .into_iter()
                .flat_map(|key| key.default_detail)
                .collect(),
        };

        let files = merge_file_set(&defaults, &request.extra_files);
        if files.is_empty() {
            return Err(CoreError::InvalidParameter {
                param: "detail".to_string(),
                reason: format!("no diagnostic files to retrieve for role '{role}'"),
            });
        }
        Ok(files)
    }

    async fn dispatch(
        &self,
        target_id: Uuid,
        files: &[String],
        config: &EffectiveConfig,
    ) -> Result<FetchedBundle, CoreError> {
        let deadline = Duration::from_secs(config.timeout_secs as u64);
        let fetch = self.fetch.fetch(target_id, files, config.timeout_secs);

        match tokio::time::timeout(deadline, fetch).await {
            Ok(Ok(bundle)) => Ok(bundle),
            Ok(Err(FetchError::Timeout)) | Err(_) => Err(CoreError::Timeout {
                target: target_id.to_string(),
                secs: config.timeout_secs,
            }),
            Ok(Err(FetchError::Unreachable(reason))) => Err(CoreError::TargetUnreachable {
                target: target_id.to_string(),
                reason,
            }),
            // The agent answered but refused or failed; its message is the
            // caller's only clue, so it travels with the error.
            Ok(Err(FetchError::Remote(reason))) => Err(CoreError::TargetUnreachable {
                target: target_id.to_string(),
                reason,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use vmdiag_core::registry::{builtin_keys, ROLE_CONSOLE_PROXY};
    use vmdiag_core::settings::builtin_settings;

    use super::*;
    use crate::collaborators::{FetchedBundle, StorageError};

    struct FixedInventory {
        role: Option<String>,
    }

    #[async_trait]
    impl Inventory for FixedInventory {
        async fn role_of(&self, target_id: Uuid) -> Result<String, InventoryError> {
            self.role
                .clone()
                .ok_or(InventoryError::NotFound(target_id))
        }
    }

    /// Records requested file lists and counts calls.
    struct RecordingFetch {
        calls: AtomicUsize,
        last_files: std::sync::Mutex<Vec<String>>,
        result: fn() -> Result<FetchedBundle, FetchError>,
    }

    impl RecordingFetch {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_files: std::sync::Mutex::new(Vec::new()),
                result: || {
                    Ok(FetchedBundle {
                        location: "/tmp/diag/bundle.tar".to_string(),
                        size_bytes: Some(1024),
                    })
                },
            }
        }

        fn failing(result: fn() -> Result<FetchedBundle, FetchError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_files: std::sync::Mutex::new(Vec::new()),
                result,
            }
        }
    }

    #[async_trait]
    impl RemoteFetch for RecordingFetch {
        async fn fetch(
            &self,
            _target_id: Uuid,
            files: &[String],
            _timeout_secs: i64,
        ) -> Result<FetchedBundle, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_files.lock().unwrap() = files.to_vec();
            (self.result)()
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

    fn registry() -> Arc<DiagnosticsKeyRegistry> {
        let registry = DiagnosticsKeyRegistry::new();
        for key in builtin_keys() {
            registry.register(key);
        }
        Arc::new(registry)
    }

    fn orchestrator(
        role: Option<&str>,
        fetch: Arc<RecordingFetch>,
        utilization: f64,
    ) -> RetrievalOrchestrator {
        RetrievalOrchestrator::new(
            Arc::new(FixedInventory {
                role: role.map(str::to_string),
            }),
            fetch,
            Arc::new(FixedProbe { utilization }),
            registry(),
            ArtifactLedger::new(),
        )
    }

    fn request(category: Option<&str>, extras: &[&str]) -> RetrievalRequest {
        RetrievalRequest {
            target_id: Uuid::new_v4(),
            category: category.map(str::to_string),
            extra_files: extras.iter().map(|s| s.to_string()).collect(),
            overrides: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn haproxy_retrieval_merges_defaults_and_extras() {
        let fetch = Arc::new(RecordingFetch::ok());
        let orch = orchestrator(Some(ROLE_CONSOLE_PROXY), fetch.clone(), 0.2);

        let artifact = orch
            .retrieve(
                request(Some("haproxy"), &["keepalived.conf", "haproxy.log"]),
                &builtin_settings(),
            )
            .await
            .unwrap();

        // Defaults first, extras after, duplicate haproxy.log dropped.
        assert_eq!(
            artifact.files,
            vec!["haproxy.log", "haproxy.cfg", "keepalived.conf"]
        );
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*fetch.last_files.lock().unwrap(), artifact.files);
        assert_eq!(orch.ledger().len().await, 1);
    }

    #[tokio::test]
    async fn no_category_unions_all_role_defaults() {
        let fetch = Arc::new(RecordingFetch::ok());
        let orch = orchestrator(Some(ROLE_CONSOLE_PROXY), fetch.clone(), 0.2);

        let artifact = orch
            .retrieve(request(None, &[]), &builtin_settings())
            .await
            .unwrap();

        // Every ConsoleProxy category contributes, in registration order.
        assert!(artifact.files.contains(&"/var/log/cloud.log".to_string()));
        assert!(artifact.files.contains(&"haproxy.cfg".to_string()));
        assert!(artifact.files.contains(&"/tmp/iptables.dump".to_string()));
        assert_eq!(artifact.files[0], "/var/log/cloud.log");
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_category_is_invalid_parameter() {
        let fetch = Arc::new(RecordingFetch::ok());
        let orch = orchestrator(Some(ROLE_CONSOLE_PROXY), fetch.clone(), 0.2);

        let err = orch
            .retrieve(request(Some("dhcp"), &[]), &builtin_settings())
            .await
            .unwrap_err();

        assert_matches!(err, CoreError::InvalidParameter { param, .. } if param == "category");
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_target_is_invalid_parameter() {
        let fetch = Arc::new(RecordingFetch::ok());
        let orch = orchestrator(None, fetch.clone(), 0.2);

        let err = orch
            .retrieve(request(Some("haproxy"), &[]), &builtin_settings())
            .await
            .unwrap_err();

        assert_matches!(err, CoreError::InvalidParameter { param, .. } if param == "target_id");
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn over_threshold_disk_refuses_without_fetch() {
        let fetch = Arc::new(RecordingFetch::ok());
        let orch = orchestrator(Some(ROLE_CONSOLE_PROXY), fetch.clone(), 0.99);

        let err = orch
            .retrieve(request(Some("haproxy"), &[]), &builtin_settings())
            .await
            .unwrap_err();

        assert_matches!(err, CoreError::CapacityExceeded { utilization, .. } if utilization > 0.95);
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 0);
        assert!(orch.ledger().is_empty().await);
    }

    #[tokio::test]
    async fn unreachable_target_maps_to_target_unreachable() {
        let fetch = Arc::new(RecordingFetch::failing(|| {
            Err(FetchError::Unreachable("connection refused".to_string()))
        }));
        let orch = orchestrator(Some(ROLE_CONSOLE_PROXY), fetch.clone(), 0.2);

        let err = orch
            .retrieve(request(Some("haproxy"), &[]), &builtin_settings())
            .await
            .unwrap_err();

        assert_matches!(err, CoreError::TargetUnreachable { .. });
        assert!(orch.ledger().is_empty().await);
    }

    #[tokio::test]
    async fn agent_error_surfaces_its_message() {
        let fetch = Arc::new(RecordingFetch::failing(|| {
            Err(FetchError::Remote("agent returned 500: no space left".to_string()))
        }));
        let orch = orchestrator(Some(ROLE_CONSOLE_PROXY), fetch.clone(), 0.2);

        let err = orch
            .retrieve(request(Some("haproxy"), &[]), &builtin_settings())
            .await
            .unwrap_err();

        assert_matches!(
            err,
            CoreError::TargetUnreachable { ref reason, .. }
                if reason.contains("no space left")
        );
        assert!(orch.ledger().is_empty().await);
    }

    #[tokio::test]
    async fn transport_timeout_maps_to_timeout() {
        let fetch = Arc::new(RecordingFetch::failing(|| Err(FetchError::Timeout)));
        let orch = orchestrator(Some(ROLE_CONSOLE_PROXY), fetch.clone(), 0.2);

        let err = orch
            .retrieve(request(Some("haproxy"), &[]), &builtin_settings())
            .await
            .unwrap_err();

        assert_matches!(err, CoreError::Timeout { secs: 3600, .. });
        assert!(orch.ledger().is_empty().await);
    }

    #[tokio::test]
    async fn deadline_expiry_discards_late_fetch() {
        struct SlowFetch {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl RemoteFetch for SlowFetch {
            async fn fetch(
                &self,
                _target_id: Uuid,
                _files: &[String],
                _timeout_secs: i64,
            ) -> Result<FetchedBundle, FetchError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(FetchedBundle {
                    location: "/tmp/late.tar".to_string(),
                    size_bytes: None,
                })
            }
        }

        tokio::time::pause();
        let fetch = Arc::new(SlowFetch {
            calls: AtomicUsize::new(0),
        });
        let orch = RetrievalOrchestrator::new(
            Arc::new(FixedInventory {
                role: Some(ROLE_CONSOLE_PROXY.to_string()),
            }),
            fetch.clone(),
            Arc::new(FixedProbe { utilization: 0.2 }),
            registry(),
            ArtifactLedger::new(),
        );

        let mut req = request(Some("haproxy"), &[]);
        req.overrides
            .insert("timeout".to_string(), "5".to_string());

        let err = orch
            .retrieve(req, &builtin_settings())
            .await
            .unwrap_err();

        assert_matches!(err, CoreError::Timeout { secs: 5, .. });
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 1);
        // The late result is never attributed.
        assert!(orch.ledger().is_empty().await);
    }

    #[tokio::test]
    async fn override_threshold_tightens_disk_guard() {
        let fetch = Arc::new(RecordingFetch::ok());
        let orch = orchestrator(Some(ROLE_CONSOLE_PROXY), fetch.clone(), 0.5);

        let mut req = request(Some("haproxy"), &[]);
        req.overrides
            .insert("disablethreshold".to_string(), "0.4".to_string());

        let err = orch
            .retrieve(req, &builtin_settings())
            .await
            .unwrap_err();

        assert_matches!(err, CoreError::CapacityExceeded { threshold, .. } if threshold == 0.4);
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 0);
    }
}
