use axum::{
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
    Router,
};
use privacylens::{logging, Config, Pipeline, RateLimiter};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    limiter: Arc<RateLimiter>,
}

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("info")?;

    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_requests,
        config.rate_limit_window,
    ));
    let pipeline = Arc::new(Pipeline::from_config(config)?);

    let cache = pipeline.cache_handle();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            cache.sweep().await;
        }
    });

    let state = AppState { pipeline, limiter };

    info!("PrivacyLens server starting...");
    info!("Health check: http://{}/health", bind_addr);
    info!("Analysis endpoint: http://{}/api/app/:query", bind_addr);

    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Create the main application with all routes
fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/app/:query", get(analyze_app))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Root endpoint - returns basic service information
async fn index() -> ResponseJson<Value> {
    ResponseJson(json!({
        "service": "PrivacyLens",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "App store privacy analysis",
        "endpoints": {
            "health": "/health",
            "analyze": "/api/app/:query"
        }
    }))
}

/// Health check endpoint
async fn health_check() -> ResponseJson<Value> {
    ResponseJson(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Analyze an app by name or package identifier
async fn analyze_app(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(query): Path<String>,
) -> Result<ResponseJson<Value>, (StatusCode, ResponseJson<Value>)> {
    let client = addr.ip().to_string();
    if !state.limiter.try_acquire(&client).await {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            ResponseJson(json!({"error": "Too many requests"})),
        ));
    }

    info!("analysis requested for {}", query);
    match state.pipeline.analyze(&query).await {
        Ok(report) => Ok(ResponseJson(json!(report))),
        Err(e) if e.is_not_found() => Err((
            StatusCode::NOT_FOUND,
            ResponseJson(json!({"error": "App not found"})),
        )),
        Err(e) => {
            error!("analysis failed for {}: {}", query, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                ResponseJson(json!({"error": "Failed to fetch metadata"})),
            ))
        }
    }
}
