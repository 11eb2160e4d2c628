use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Json},
        routing::get,
    },
    tower_http::cors::{Any, CorsLayer},
    tracing::info,
};

use crate::health::HealthState;

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(health: Arc<HealthState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(health)
}

/// Bind and serve the gateway. Runs until the process exits; the caller
/// spawns this on its own task.
pub async fn serve(bind: &str, port: u16, health: Arc<HealthState>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "health gateway listening");

    let app = build_app(health);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler(State(health): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": if health.healthy() { "ok" } else { "starting" },
        "version": health.version,
        "hostname": health.hostname,
        "uptime_secs": health.uptime_secs(),
        "registry_loaded": health.registry_loaded(),
        "platform_connected": health.platform_connected(),
    });

    let code = if health.healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}
