use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vmdiag_api::background::gc_config::DbGcConfigSource;
use vmdiag_api::config::ServerConfig;
use vmdiag_api::inventory::DbInventory;
use vmdiag_api::{routes, state};
use vmdiag_core::registry::{builtin_keys, DiagnosticsKeyRegistry};
use vmdiag_db::repositories::DiagnosticsKeyRepo;
use vmdiag_db::DbPool;
use vmdiag_service::capacity::{LocalDiskProbe, LocalDiskStorage};
use vmdiag_service::channel::AgentChannel;
use vmdiag_service::orchestrator::RetrievalOrchestrator;
use vmdiag_service::{gc, ArtifactLedger};

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vmdiag_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = vmdiag_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    vmdiag_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    vmdiag_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Diagnostics key registry ---
    let registry = seed_registry(&pool)
        .await
        .expect("Failed to seed diagnostics key registry");
    tracing::info!(keys = registry.len(), "Diagnostics key registry seeded");

    // --- Orchestrator ---
    let ledger = ArtifactLedger::new();
    let channel = AgentChannel::new(config.agent_base_url.clone(), config.agent_timeout_secs)
        .expect("Failed to build agent HTTP client");
    let orchestrator = Arc::new(RetrievalOrchestrator::new(
        Arc::new(DbInventory::new(pool.clone())),
        Arc::new(channel),
        Arc::new(LocalDiskProbe),
        Arc::clone(&registry),
        ledger.clone(),
    ));

    // --- Garbage collector ---
    let gc_cancel = tokio_util::sync::CancellationToken::new();
    let gc_handle = tokio::spawn(gc::run(
        ledger.clone(),
        Arc::new(LocalDiskStorage),
        Arc::new(LocalDiskProbe),
        Arc::new(DbGcConfigSource::new(pool.clone())),
        gc_cancel.clone(),
    ));

    // --- App state ---
    let app_state = AppState {
        pool,
        config: Arc::new(config.clone()),
        registry,
        orchestrator,
        ledger,
    };

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        // API v1 routes.
        .nest("/api/v1", routes::api_routes())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Shared state.
        .with_state(app_state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    gc_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), gc_handle).await;
    tracing::info!("Diagnostics GC stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Build the in-memory registry: shipped definitions first, then the
/// persisted rows on top (operator edits win), then persist any shipped
/// definition the table does not know yet.
async fn seed_registry(pool: &DbPool) -> Result<Arc<DiagnosticsKeyRegistry>, sqlx::Error> {
    let registry = DiagnosticsKeyRegistry::new();

    for key in builtin_keys() {
        registry.register(key);
    }

    let stored = DiagnosticsKeyRepo::list_all(pool).await?;
    let stored_keys: Vec<_> = stored.iter().map(|row| row.to_key()).collect();
    for key in &stored_keys {
        registry.register(key.clone());
    }

    for key in builtin_keys() {
        let known = stored_keys
            .iter()
            .any(|s| s.role == key.role && s.category == key.category);
        if !known {
            DiagnosticsKeyRepo::upsert(pool, &key).await?;
        }
    }

    Ok(Arc::new(registry))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
