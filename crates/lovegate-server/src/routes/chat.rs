use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use lovegate_provider::LlmRequest;
use lovegate_story::prompt::AiSkillCheck;
use lovegate_story::{
    build_system_prompt, chat_system_prompt, fallback_reply, parse_ai_reply, AiChoice, AiReply, Emotion, MemoryBook,
    MemoryFact, PromptParams, RelationshipStats, StatDelta,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Every field is optional on the wire so that absent and blank values
/// produce the same 400.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    #[serde(default)]
    pub character_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Present when the client wants a stats-aware structured reply.
    #[serde(default)]
    pub stats: Option<RelationshipStats>,
    #[serde(default)]
    pub emotion: Option<Emotion>,
    #[serde(default)]
    pub seq: Option<u64>,
    /// Facts the client remembers about the player; only the addressed
    /// character's unexpired facts reach the prompt.
    #[serde(default)]
    pub memory: Vec<MemoryFact>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<AiChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat_changes: Option<StatDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_check: Option<AiSkillCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl ChatResponse {
    fn plain(reply: String, seq: Option<u64>) -> Self {
        Self {
            reply,
            choices: Vec::new(),
            stat_changes: None,
            skill_check: None,
            seq,
        }
    }

    fn structured(reply: AiReply, seq: Option<u64>) -> Self {
        Self {
            reply: reply.reply,
            choices: reply.choices,
            stat_changes: reply.stat_changes,
            skill_check: reply.skill_check,
            seq,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "chat body rejected");
        match &rejection {
            JsonRejection::JsonDataError(_) => ApiError::BadRequest(rejection.body_text()),
            _ => ApiError::missing_fields(),
        }
    })?;
    let (Some(raw_id), Some(message)) = (non_blank(payload.character_id), non_blank(payload.message)) else {
        return Err(ApiError::missing_fields());
    };

    let (character, persona) = state.persona(&raw_id);
    let memory = character.and_then(|id| MemoryBook::from_facts(payload.memory).prompt_context(id, Utc::now()));

    let structured = match (character, payload.stats) {
        (Some(id), Some(stats)) => {
            let c = id.character();
            Some(build_system_prompt(&PromptParams {
                name: c.name,
                archetype: c.archetype(),
                stats,
                emotion: payload.emotion.unwrap_or_default(),
                memory: memory.as_deref(),
            }))
        }
        (None, Some(_)) => {
            tracing::warn!(character = %raw_id, "stats sent for unknown character, answering as plain chat");
            None
        }
        _ => None,
    };
    let is_structured = structured.is_some();
    let system = structured.unwrap_or_else(|| chat_system_prompt(persona, memory.as_deref()));

    tracing::debug!(character = %raw_id, structured = is_structured, "forwarding chat message");
    let response = state
        .provider
        .chat(LlmRequest::simple(state.model.clone(), Some(system), message))
        .await
        .map_err(ApiError::Upstream)?;

    let body = if is_structured {
        let reply = parse_ai_reply(&response.text).unwrap_or_else(|| {
            tracing::warn!(character = %raw_id, "model reply was not structured JSON");
            fallback_reply(&response.text)
        });
        ChatResponse::structured(reply, payload.seq)
    } else {
        ChatResponse::plain(response.text, payload.seq)
    };
    Ok(Json(body))
}
