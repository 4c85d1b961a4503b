use std::sync::Arc;
use std::time::Duration;

use linkpage::config::AppConfig;
use linkpage::onboarding::{
    OnboardingRouteState, SessionRegistry, onboarding_routes, spawn_expiry_task,
};
use linkpage::store::{Database, LibSqlBackend};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("linkpage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    // ── Routes ───────────────────────────────────────────────────────────
    let registry = Arc::new(
        SessionRegistry::new(Arc::clone(&db), config.validation)
            .with_idle_timeout(config.session_idle_timeout),
    );
    let _expiry_handle = spawn_expiry_task(Arc::clone(&registry), Duration::from_secs(60));
    let app = onboarding_routes(OnboardingRouteState {
        registry,
        admin_list_limit: config.admin_list_limit,
    })
    .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "HTTP server started");
    axum::serve(listener, app).await?;

    Ok(())
}
