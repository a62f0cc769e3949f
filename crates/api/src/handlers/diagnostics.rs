//! Handlers for diagnostics retrieval and the category registry.

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use vmdiag_core::registry::DiagnosticsKey;
use vmdiag_db::repositories::DiagnosticsKeyRepo;
use vmdiag_service::orchestrator::RetrievalRequest;
use vmdiag_service::RetrievedArtifact;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::settings::load_effective_settings;
use crate::state::AppState;

/// Request body for `POST /api/v1/diagnostics/retrieve`.
#[derive(Debug, Deserialize)]
pub struct RetrieveDiagnosticsBody {
    /// Managed VM to pull diagnostics from.
    pub target_id: Uuid,
    /// Registered category; omit to pull the defaults of every category
    /// registered for the target's role.
    pub category: Option<String>,
    /// Extra files appended after the category defaults.
    #[serde(default)]
    pub detail: Vec<String>,
    /// Per-request setting overrides by short name (`timeout`,
    /// `disablethreshold`, ...).
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

/// POST /api/v1/diagnostics/retrieve -- run one retrieval.
pub async fn retrieve_diagnostics(
    State(state): State<AppState>,
    Json(body): Json<RetrieveDiagnosticsBody>,
) -> AppResult<Json<DataResponse<RetrievedArtifact>>> {
    let settings = load_effective_settings(&state.pool, "global", None).await?;

    let request = RetrievalRequest {
        target_id: body.target_id,
        category: body.category,
        extra_files: body.detail,
        overrides: body.overrides,
    };
    let artifact = state.orchestrator.retrieve(request, &settings).await?;
    Ok(Json(DataResponse { data: artifact }))
}

/// Request body for `POST /api/v1/diagnostics/keys`.
#[derive(Debug, Deserialize)]
pub struct RegisterKeyBody {
    pub role: String,
    pub category: String,
    #[serde(default)]
    pub default_detail: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// POST /api/v1/diagnostics/keys -- register (or replace) a category
/// definition, in memory and persisted.
pub async fn register_key(
    State(state): State<AppState>,
    Json(body): Json<RegisterKeyBody>,
) -> AppResult<Json<DataResponse<DiagnosticsKey>>> {
    if body.role.trim().is_empty() {
        return Err(AppError::BadRequest("role must not be empty".to_string()));
    }
    if body.category.trim().is_empty() {
        return Err(AppError::BadRequest("category must not be empty".to_string()));
    }

    let key = DiagnosticsKey {
        role: body.role,
        category: body.category,
        default_detail: body.default_detail,
        description: body.description,
    };

    DiagnosticsKeyRepo::upsert(&state.pool, &key).await?;
    state.registry.register(key.clone());

    Ok(Json(DataResponse { data: key }))
}

/// GET /api/v1/diagnostics/keys -- all registered category definitions,
/// ordered by role then category.
pub async fn list_keys(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<DiagnosticsKey>>>> {
    Ok(Json(DataResponse {
        data: state.registry.list_all(),
    }))
}
