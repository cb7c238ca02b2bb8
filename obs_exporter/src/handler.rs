//! `GET /metrics`: fetch from OBS, map, serialize. Each scrape is independent.

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{debug, warn};

use crate::config::ObsEndpoint;
use crate::error::Result;
use crate::metrics::render;
use crate::state::AppState;
use crate::ws::fetch_snapshots;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match scrape(&state.config.obs).await {
        Ok(body) => (StatusCode::OK, [(CONTENT_TYPE, TEXT_PLAIN)], body).into_response(),
        Err(e) => {
            warn!(stage = e.stage(), "scrape failed: {e}");
            (
                state.config.error_status,
                [(CONTENT_TYPE, TEXT_PLAIN)],
                format!("# Error: {e}"),
            )
                .into_response()
        }
    }
}

/// One fetch-map-serialize cycle.
pub async fn scrape(endpoint: &ObsEndpoint) -> Result<String> {
    let snapshots = fetch_snapshots(endpoint).await?;
    let body = render(&snapshots)?;
    debug!(bytes = body.len(), "scrape complete");
    Ok(body)
}
