//! HTTP surface for the dashboard
//!
//! - `GET /api/v1/admin/dashboard?range=<token>` (alias `periode`)
//! - `GET /health`

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use gamidash_core::analytics::{DashboardEngine, DashboardStats, Period};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub type SharedEngine = Arc<DashboardEngine>;

/// Build the router with CORS and request tracing.
pub fn router(engine: SharedEngine) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/admin/dashboard", get(dashboard))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(engine)
}

/// Serve until Ctrl-C.
pub async fn serve(engine: SharedEngine, bind: &str) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    let addr = listener.local_addr().context("failed to read local address")?;

    tracing::info!(%addr, "Dashboard API listening");
    println!("Dashboard API listening on http://{}", addr);

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Dashboard API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    "OK"
}

/// Query string of the dashboard endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub range: Option<String>,
    pub periode: Option<String>,
}

impl DashboardParams {
    /// `range` wins over `periode`; blank values count as absent.
    pub fn token(&self) -> &str {
        [self.range.as_deref(), self.periode.as_deref()]
            .into_iter()
            .flatten()
            .find(|token| !token.trim().is_empty())
            .unwrap_or("")
    }
}

#[derive(Serialize)]
struct DataResponse {
    data: DashboardStats,
}

/// GET /api/v1/admin/dashboard
async fn dashboard(
    State(engine): State<SharedEngine>,
    Query(params): Query<DashboardParams>,
) -> std::result::Result<Json<DataResponse>, ApiError> {
    let period = Period::parse(params.token());
    let now = engine.now()?;
    let stats = engine.compute(&period, now).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// Engine error rendered as `{"error": ...}`.
struct ApiError(gamidash_core::Error);

impl From<gamidash_core::Error> for ApiError {
    fn from(e: gamidash_core::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_fatal() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        tracing::error!(status = status.as_u16(), error = %self.0, "Dashboard request failed");
        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}
