use anyhow::Context;
use api_client::CoinDirectory;
use axum::{Router, routing::get};
use configuration::{AnalyticsSettings, Settings};
use engine::CorrelationEngine;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub engine: CorrelationEngine,
    pub directory: CoinDirectory,
    /// Query parameters a request leaves out.
    pub defaults: AnalyticsSettings,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let engine = CorrelationEngine::from_settings(settings)?;
        let directory = CoinDirectory::from_settings(&settings.provider, settings.cache.coin_list_ttl)?;
        Ok(Self {
            engine,
            directory,
            defaults: settings.analytics.clone(),
        })
    }
}

/// All routes, with permissive CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/correlation-matrix", get(handlers::correlation_matrix))
        .route("/api/rolling-correlation", get(handlers::rolling_correlation))
        .route("/api/beta", get(handlers::beta))
        .route("/api/coins", get(handlers::coins))
        .route("/api/coins/all", get(handlers::all_coins))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// The main function to configure and run the web server.
///
/// Tracing is expected to be initialised by the caller.
pub async fn run_server(settings: &Settings) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_settings(settings)?);
    let app = router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(address = %addr, "Web server started.");

    axum::serve(listener, app).await?;
    Ok(())
}
