use crate::config::Config;
use crate::governor::Governor;
use crate::providers::AdapterRegistry;
use crate::selection::ProviderSelector;
use crate::store::{open_store, KeyValueStore, UsageRecorder};
use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod rate_limit;
pub mod routes_catalog;
pub mod routes_health;
pub mod routes_proxy;

pub use error::ProxyError;

/// Response header naming the provider that served a request.
pub const ACTIVE_PROVIDER_HEADER: &str = "x-active-provider";

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Governs every outbound upstream call
    pub governor: Governor,
    pub registry: Arc<AdapterRegistry>,
    pub selector: ProviderSelector,
    pub store: Arc<dyn KeyValueStore>,
    /// Debounced writer of per-provider usage statistics
    pub usage: UsageRecorder,
}

impl AppContext {
    /// Build the context from configuration, opening the configured store.
    pub fn new(config: Config) -> Result<Self> {
        let governor = Governor::new(config.governor.clone())
            .context("Failed to build the upstream HTTP client")?;
        let store = open_store(config.store.path.as_deref());
        Ok(Self::with_parts(config, governor, store))
    }

    pub fn with_parts(config: Config, governor: Governor, store: Arc<dyn KeyValueStore>) -> Self {
        let registry = Arc::new(AdapterRegistry::new(&config, governor.clone()));
        let selector = ProviderSelector::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            config.store.read_timeout(),
        );
        let usage = UsageRecorder::new(Arc::clone(&store), config.store.usage_flush());

        Self {
            config: Arc::new(config),
            governor,
            registry,
            selector,
            store,
            usage,
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let mut api = routes_proxy::proxy_routes()
        .merge(routes_catalog::catalog_routes())
        .merge(routes_health::health_routes());

    if let Some(limiter) = ctx
        .config
        .server
        .requests_per_minute
        .and_then(rate_limit::inbound_limiter)
    {
        api = api.layer(middleware::from_fn_with_state(
            limiter,
            rate_limit::limit_requests,
        ));
    }

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(cors_layer(&ctx.config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(ACTIVE_PROVIDER_HEADER)])
        .max_age(Duration::from_secs(86_400));

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let ctx = AppContext::new(config)?;
    let usage = ctx.usage.clone();
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match usage.flush().await {
        Ok(0) => {}
        Ok(n) => tracing::info!("Flushed {} pending usage samples", n),
        Err(e) => tracing::warn!("Failed to flush usage statistics: {}", e),
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
