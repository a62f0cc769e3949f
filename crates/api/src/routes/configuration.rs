use axum::routing::{get, post};
use axum::Router;

use crate::handlers::configuration;
use crate::state::AppState;

/// Configuration resolution and query routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/diagnostics/config",
            get(configuration::list_config).put(configuration::update_config),
        )
        .route(
            "/diagnostics/config/resolve",
            post(configuration::resolve_config),
        )
}
