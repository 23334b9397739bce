use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lovegate_story::StoryError;
use thiserror::Error;

pub const MISSING_FIELDS: &str = "Необходимы поля characterId и message";
pub const SERVER_ERROR: &str = "Ошибка сервера";

/// Every failure leaves the server as `{ "error": "..." }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("upstream failure: {0:#}")]
    Upstream(anyhow::Error),
}

impl ApiError {
    pub fn missing_fields() -> Self {
        Self::BadRequest(MISSING_FIELDS.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoryError> for ApiError {
    fn from(err: StoryError) -> Self {
        match err {
            StoryError::UnknownCharacter(_) | StoryError::EmptyStory(_) => Self::NotFound(err.to_string()),
            other => Self::Upstream(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::BadRequest(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Upstream(err) => {
                tracing::error!(error = %format!("{err:#}"), "request failed");
                SERVER_ERROR.to_string()
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_errors_map_to_status() {
        let missing: ApiError = StoryError::UnknownCharacter("x".into()).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let broken: ApiError = StoryError::DanglingReference {
            scene: "a".into(),
            choice: "b".into(),
            target: "c".into(),
        }
        .into();
        assert_eq!(broken.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upstream_detail_is_not_exposed() {
        let err = ApiError::Upstream(anyhow::anyhow!("secret upstream detail"));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
