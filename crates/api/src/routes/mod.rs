pub mod configuration;
pub mod diagnostics;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /diagnostics/retrieve           run one retrieval (POST)
/// /diagnostics/keys               list (GET), register (POST)
/// /diagnostics/config             list resolved settings (GET), store a value (PUT)
/// /diagnostics/config/resolve     dry-run override resolution (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(diagnostics::router())
        .merge(configuration::router())
}
