pub mod error;
pub mod routes;
pub mod state;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", routes::api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("lovegate-server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use lovegate_provider::StubProvider;
    use lovegate_story::StoryEngine;
    use tower::util::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn router_allows_cross_origin_chat() {
        let engine = StoryEngine::builtin().expect("builtin stories");
        let app = create_router(AppState::new(Arc::new(StubProvider), Arc::new(engine)));

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header("origin", "https://example.org")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"characterId":"lera","message":"йо"}"#))
                    .expect("build request"),
            )
            .await
            .expect("send request");

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("access-control-allow-origin").map(|v| v.as_bytes()),
            Some(&b"*"[..])
        );
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.expect("read body");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(json["reply"], "[stub:deepseek-chat] йо");
    }
}
