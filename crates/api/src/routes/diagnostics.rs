use axum::routing::{get, post};
use axum::Router;

use crate::handlers::diagnostics;
use crate::state::AppState;

/// Diagnostics retrieval and registry routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/diagnostics/retrieve",
            post(diagnostics::retrieve_diagnostics),
        )
        .route(
            "/diagnostics/keys",
            get(diagnostics::list_keys).post(diagnostics::register_key),
        )
}
