//! In-memory ledger of retrieved diagnostic artifacts.
//!
//! Every successful retrieval records an artifact here; the garbage
//! collector scans it to decide what to evict. The ledger is authoritative
//! for artifact lifecycle state, the filesystem only holds the bytes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;
use vmdiag_core::types::Timestamp;

/// Lifecycle state of a staged artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtifactState {
    /// Within its retention window.
    Active,
    /// Past retention (or flagged by a pressure sweep); the next GC pass
    /// will try to delete it. A failed delete leaves it Eligible for retry.
    Eligible,
}

/// A diagnostic bundle staged on the management host.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedArtifact {
    pub id: Uuid,
    pub target_id: Uuid,
    /// Category the retrieval named, or `None` for a full-defaults pull.
    pub category: Option<String>,
    /// Files that were requested from the target.
    pub files: Vec<String>,
    /// Staging-area path of the bundle.
    pub location: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    artifact: RetrievedArtifact,
    state: ArtifactState,
}

/// Shared artifact ledger. Clone is cheap; all clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct ArtifactLedger {
    entries: Arc<RwLock<HashMap<Uuid, LedgerEntry>>>,
}

impl ArtifactLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly staged artifact and return it.
    pub async fn record(
        &self,
        target_id: Uuid,
        category: Option<String>,
        files: Vec<String>,
        location: String,
    ) -> RetrievedArtifact {
        let artifact = RetrievedArtifact {
            id: Uuid::new_v4(),
            target_id,
            category,
            files,
            location,
            created_at: Utc::now(),
        };
        let mut entries = self.entries.write().await;
        entries.insert(
            artifact.id,
            LedgerEntry {
                artifact: artifact.clone(),
                state: ArtifactState::Active,
            },
        );
        artifact
    }

    /// All artifacts with their states, unordered.
    pub async fn snapshot(&self) -> Vec<(RetrievedArtifact, ArtifactState)> {
        self.entries
            .read()
            .await
            .values()
            .map(|entry| (entry.artifact.clone(), entry.state))
            .collect()
    }

    /// Mark an artifact eligible for eviction. No-op if it is gone already.
    pub async fn mark_eligible(&self, id: Uuid) {
        if let Some(entry) = self.entries.write().await.get_mut(&id) {
            entry.state = ArtifactState::Eligible;
        }
    }

    /// Drop an artifact from the ledger after its bundle was deleted.
    pub async fn remove(&self, id: Uuid) {
        self.entries.write().await.remove(&id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_then_snapshot() {
        let ledger = ArtifactLedger::new();
        let target = Uuid::new_v4();
        let artifact = ledger
            .record(
                target,
                Some("haproxy".to_string()),
                vec!["haproxy.log".to_string()],
                "/tmp/diag/bundle.tar".to_string(),
            )
            .await;

        let snapshot = ledger.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0.id, artifact.id);
        assert_eq!(snapshot[0].0.target_id, target);
        assert_eq!(snapshot[0].1, ArtifactState::Active);
    }

    #[tokio::test]
    async fn mark_eligible_then_remove() {
        let ledger = ArtifactLedger::new();
        let artifact = ledger
            .record(Uuid::new_v4(), None, vec![], "/tmp/diag/b.tar".to_string())
            .await;

        ledger.mark_eligible(artifact.id).await;
        let snapshot = ledger.snapshot().await;
        assert_eq!(snapshot[0].1, ArtifactState::Eligible);

        ledger.remove(artifact.id).await;
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn mark_eligible_on_missing_id_is_noop() {
        let ledger = ArtifactLedger::new();
        ledger.mark_eligible(Uuid::new_v4()).await;
        assert!(ledger.is_empty().await);
    }
}
