pub mod characters;
pub mod chat;
pub mod health;
pub mod story;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(chat::router())
        .merge(health::router())
        .nest("/characters", characters::router())
        .nest("/story", story::router())
}
