use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    /// `false` when the upstream provider reports itself unusable.
    pub provider: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let provider = match state.provider.health().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "provider health check failed");
            false
        }
    };
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider,
    })
}
