use axum::{extract::State, http::StatusCode};
use tracing::warn;

use crate::AppState;

/// Reachability of the clinic store.
pub async fn health(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Unavailable")
        }
    }
}
