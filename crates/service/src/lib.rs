//! Retrieval orchestration for fleet diagnostics.
//!
//! Owns the end-to-end retrieval flow (resolve config, guard disk capacity,
//! build the file set, fetch from the target VM's agent under a deadline,
//! record the artifact) and the background garbage collector that evicts
//! aged artifacts from the staging area.
//!
//! Collaborators that touch the outside world (inventory, agent channel,
//! disk probe, artifact storage) sit behind async traits in
//! [`collaborators`], so the whole flow is testable with in-memory fakes.

pub mod artifact;
pub mod capacity;
pub mod channel;
pub mod collaborators;
pub mod gc;
pub mod orchestrator;

pub use artifact::{ArtifactLedger, ArtifactState, RetrievedArtifact};
pub use orchestrator::{RetrievalOrchestrator, RetrievalRequest};
