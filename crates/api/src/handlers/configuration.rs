//! Handlers for configuration resolution and querying.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use vmdiag_core::error::CoreError;
use vmdiag_core::query::{find_settings, resolve_settings, ResolvedSetting};
use vmdiag_core::resolver::{self, EffectiveConfig};
use vmdiag_core::settings::{builtin_settings, find_setting, SettingScope};
use vmdiag_db::models::configuration::{ConfigurationRow, UpsertConfiguration};
use vmdiag_db::repositories::ConfigurationRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::settings::{load_effective_settings, to_persisted};
use crate::state::AppState;

/// Request body for `POST /api/v1/diagnostics/config/resolve`.
///
/// Dry-runs the override resolution a retrieval would perform, without
/// touching any VM.
#[derive(Debug, Deserialize)]
pub struct ResolveConfigBody {
    #[serde(default)]
    pub overrides: HashMap<String, String>,
    /// Scope to overlay persisted rows from; defaults to global.
    pub scope: Option<String>,
    pub scope_id: Option<i64>,
}

/// POST /api/v1/diagnostics/config/resolve -- resolve the effective config.
pub async fn resolve_config(
    State(state): State<AppState>,
    Json(body): Json<ResolveConfigBody>,
) -> AppResult<Json<DataResponse<EffectiveConfig>>> {
    let scope = body.scope.as_deref().unwrap_or("global");
    let settings = load_effective_settings(&state.pool, scope, body.scope_id).await?;
    let config = resolver::resolve(&body.overrides, &settings)?;
    Ok(Json(DataResponse { data: config }))
}

/// Response payload for the configuration listing.
#[derive(Debug, Serialize)]
pub struct ConfigListData {
    pub settings: Vec<ResolvedSetting>,
    /// Unpaginated match count.
    pub total: usize,
}

/// GET /api/v1/diagnostics/config -- list resolved settings.
///
/// Reserved query keys: `limit`, `offset`, `scope`, `scope_id`. Every other
/// key is an equality predicate on that setting's effective value; a
/// predicate naming an unknown setting matches nothing.
pub async fn list_config(
    State(state): State<AppState>,
    Query(mut params): Query<HashMap<String, String>>,
) -> AppResult<Json<DataResponse<ConfigListData>>> {
    let limit = take_i64(&mut params, "limit")?;
    let offset = take_i64(&mut params, "offset")?;
    let scope = params.remove("scope").unwrap_or_else(|| "global".to_string());
    let scope_id = take_i64(&mut params, "scope_id")?;

    let rows = ConfigurationRepo::load_settings(&state.pool, &scope, scope_id).await?;
    let resolved = resolve_settings(&builtin_settings(), &to_persisted(rows));
    let (settings, total) = find_settings(&resolved, &params, offset, limit);

    Ok(Json(DataResponse {
        data: ConfigListData { settings, total },
    }))
}

/// PUT /api/v1/diagnostics/config -- store a setting value at a scope.
///
/// The name must be a registered setting and the value must parse as that
/// setting's declared kind; stored garbage would otherwise silently revert
/// to the default at resolution time.
pub async fn update_config(
    State(state): State<AppState>,
    Json(body): Json<UpsertConfiguration>,
) -> AppResult<Json<DataResponse<ConfigurationRow>>> {
    let builtins = builtin_settings();
    let setting = find_setting(&builtins, &body.name).ok_or_else(|| {
        AppError::Core(CoreError::InvalidParameter {
            param: "name".to_string(),
            reason: format!("unknown setting '{}'", body.name),
        })
    })?;
    setting.kind.parse(&body.value).map_err(AppError::Core)?;
    if let Some(scope) = body.scope.as_deref() {
        SettingScope::from_name(scope).map_err(AppError::Core)?;
    }

    let row = ConfigurationRepo::upsert(&state.pool, &body).await?;
    tracing::info!(name = %row.name, scope = %row.scope, "Configuration updated");
    Ok(Json(DataResponse { data: row }))
}

fn take_i64(params: &mut HashMap<String, String>, key: &str) -> Result<Option<i64>, AppError> {
    match params.remove(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("'{key}' must be an integer, got '{raw}'"))),
    }
}
