//! Domain error taxonomy for diagnostics retrieval.
//!
//! Every variant carries enough context (target id, parameter name,
//! threshold values) to reproduce the failure from the error alone.
//! Recoverable per-field parse errors never reach this type — the resolver
//! substitutes defaults and logs them instead.

/// Domain errors surfaced to the command layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A caller-supplied parameter was malformed or referenced something
    /// unknown (e.g. a diagnostics category not registered for the role).
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParameter { param: String, reason: String },

    /// A required parameter was absent and no safe default exists.
    #[error("Missing required parameter '{param}'")]
    MissingParameter { param: String },

    /// An entity lookup came back empty.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// The remote agent channel could not reach the target VM.
    /// Retryable from the caller's side; the orchestrator does not retry.
    #[error("Target '{target}' unreachable: {reason}")]
    TargetUnreachable { target: String, reason: String },

    /// The remote fetch exceeded the effective timeout. The remote side is
    /// not guaranteed to have stopped; any late result is discarded.
    #[error("Diagnostics retrieval from '{target}' timed out after {secs}s")]
    Timeout { target: String, secs: i64 },

    /// Pre-flight disk guard tripped; no remote contact was attempted.
    #[error(
        "Disk utilization {utilization:.2} at '{path}' exceeds threshold {threshold:.2}"
    )]
    CapacityExceeded {
        path: String,
        utilization: f64,
        threshold: f64,
    },

    /// Backing storage failure (GC eviction, staged bundle handling).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Anything that should never happen in correct operation.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the workspace.
pub type CoreResult<T> = Result<T, CoreError>;
