use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use lovegate_story::{CharacterId, ChoiceView, RelationshipStats, Scene, SkillCheckOutcome, StatDelta};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRef<'a> {
    pub id: &'a str,
    pub title: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneView<'a> {
    pub episode: Option<EpisodeRef<'a>>,
    pub scene: &'a Scene,
    pub choices: Vec<ChoiceView<'a>>,
    /// Success chance in percent when the scene carries a skill check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_check_chance: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequest {
    pub scene_id: String,
    pub choice_id: String,
    #[serde(default)]
    pub stats: Option<RelationshipStats>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceResponse<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<SceneView<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat_delta: Option<StatDelta>,
    pub stats: RelationshipStats,
    pub episode_ended: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCheckRequest {
    pub scene_id: String,
    pub stats: RelationshipStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCheckResponse {
    #[serde(flatten)]
    pub outcome: SkillCheckOutcome,
    pub summary: String,
    pub stats: RelationshipStats,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/initial", get(initial_scene))
        .route("/{id}/advance", post(advance))
        .route("/{id}/skill-check", post(skill_check))
}

fn scene_view<'a>(state: &'a AppState, character: CharacterId, scene: &'a Scene, stats: &RelationshipStats) -> SceneView<'a> {
    let episode = state
        .engine
        .episode_of_scene(character, &scene.id)
        .map(|e| EpisodeRef {
            id: &e.id,
            title: &e.title,
        });
    SceneView {
        episode,
        scene,
        choices: state.engine.available_choices(scene, stats),
        skill_check_chance: scene.skill_check.as_ref().map(|c| c.chance(stats)),
    }
}

fn find_scene<'a>(state: &'a AppState, character: CharacterId, scene_id: &str) -> Result<&'a Scene, ApiError> {
    state
        .engine
        .scene_by_id(character, scene_id)
        .ok_or_else(|| ApiError::NotFound(format!("scene {scene_id} not found for {character}")))
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

async fn initial_scene(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let character: CharacterId = id.parse()?;
    let scene = state.engine.initial_scene(character)?;
    let view = scene_view(&state, character, scene, &RelationshipStats::initial());
    to_value(&view)
}

async fn advance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<AdvanceRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let character: CharacterId = id.parse()?;
    let Json(req) = body.map_err(bad_body)?;
    let current = find_scene(&state, character, &req.scene_id)?;

    let step = state.engine.advance(character, current, &req.choice_id);
    let stats = match (req.stats, step.stat_delta) {
        (Some(stats), Some(delta)) => stats.apply(&delta),
        (Some(stats), None) => stats,
        (None, Some(delta)) => RelationshipStats::initial().apply(&delta),
        (None, None) => RelationshipStats::initial(),
    };
    let response = AdvanceResponse {
        next: step.next_scene.map(|scene| scene_view(&state, character, scene, &stats)),
        stat_delta: step.stat_delta,
        stats,
        episode_ended: step.episode_ended,
    };
    to_value(&response)
}

async fn skill_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SkillCheckRequest>, JsonRejection>,
) -> Result<Json<SkillCheckResponse>, ApiError> {
    let character: CharacterId = id.parse()?;
    let Json(req) = body.map_err(bad_body)?;
    let scene = find_scene(&state, character, &req.scene_id)?;
    let check = scene
        .skill_check
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest(format!("scene {} has no skill check", scene.id)))?;

    let outcome = check.resolve(&req.stats, &mut rand::thread_rng());
    let stats = req.stats.apply(&outcome.stat_delta);
    tracing::info!(
        character = %character,
        check = %outcome.check_id,
        roll = outcome.result.roll,
        success = outcome.result.success,
        "skill check resolved"
    );
    Ok(Json(SkillCheckResponse {
        summary: outcome.result.summary(),
        outcome,
        stats,
    }))
}

// views borrow from the state, so they are rendered to owned JSON here
fn to_value<T: Serialize>(value: &T) -> Result<Json<serde_json::Value>, ApiError> {
    serde_json::to_value(value)
        .map(Json)
        .map_err(|e| ApiError::Upstream(e.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use lovegate_provider::StubProvider;
    use lovegate_story::StoryEngine;
    use tower::util::ServiceExt;

    use crate::state::AppState;

    fn app() -> Router {
        let engine = StoryEngine::builtin().expect("builtin stories");
        let state = AppState::new(Arc::new(StubProvider), Arc::new(engine));
        Router::new().nest("/api/story", super::router()).with_state(state)
    }

    async fn send(req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app().oneshot(req).await.expect("send request");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.expect("read body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("build request")
    }

    fn stats(trust: u8) -> serde_json::Value {
        serde_json::json!({"affection": 10, "trust": trust, "chemistry": 10, "jealousy": 5, "vulnerability": 10})
    }

    #[tokio::test]
    async fn initial_scene_for_alisa() {
        let req = Request::builder()
            .uri("/api/story/alisa/initial")
            .body(Body::empty())
            .expect("build request");
        let (status, json) = send(req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["scene"]["id"], "kuudere-cafe");
        assert_eq!(json["episode"]["id"], "kuudere-ep1");
        let choices = json["choices"].as_array().expect("choices");
        assert_eq!(choices.len(), 3);
        let compliment = choices.iter().find(|c| c["id"] == "compliment").expect("compliment");
        assert_eq!(compliment["locked"], true);
    }

    #[tokio::test]
    async fn unknown_character_is_404() {
        let req = Request::builder()
            .uri("/api/story/nobody/initial")
            .body(Body::empty())
            .expect("build request");
        let (status, json) = send(req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn advance_applies_choice_delta() {
        let body = serde_json::json!({"sceneId": "kuudere-cafe", "choiceId": "sit-confident", "stats": stats(10)});
        let (status, json) = send(post("/api/story/alisa/advance", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["episodeEnded"], false);
        assert!(json["next"]["scene"]["id"].is_string());
        assert!(json["statDelta"].is_object());
    }

    #[tokio::test]
    async fn unknown_choice_ends_episode() {
        let body = serde_json::json!({"sceneId": "kuudere-cafe", "choiceId": "nope"});
        let (status, json) = send(post("/api/story/alisa/advance", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["episodeEnded"], true);
        assert!(json.get("next").is_none());
        assert_eq!(json["stats"], stats(10));
    }

    #[tokio::test]
    async fn unknown_scene_is_404() {
        let body = serde_json::json!({"sceneId": "missing", "choiceId": "x"});
        let (status, _) = send(post("/api/story/alisa/advance", body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn skill_check_resolves_on_scene() {
        let body = serde_json::json!({"sceneId": "tsundere-adventure", "stats": stats(40)});
        let (status, json) = send(post("/api/story/maria/skill-check", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["checkId"], "maria-trust-check");
        let roll = json["result"]["roll"].as_u64().expect("roll");
        assert!((1..=20).contains(&roll));
        assert!(json["summary"].is_string());
        assert!(json["stats"]["trust"].is_u64());
    }

    #[tokio::test]
    async fn scene_without_check_is_400() {
        let body = serde_json::json!({"sceneId": "tsundere-street", "stats": stats(10)});
        let (status, json) = send(post("/api/story/maria/skill-check", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("tsundere-street"));
    }
}
