use axum::extract::Path;
use axum::routing::get;
use axum::{Json, Router};
use lovegate_story::{Archetype, Character, CharacterId};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Public card for a character. The persona text stays server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterCard {
    pub id: CharacterId,
    pub name: &'static str,
    pub emoji: &'static str,
    pub short_description: &'static str,
    pub intro_message: &'static str,
    pub archetype: Archetype,
}

impl From<&'static Character> for CharacterCard {
    fn from(c: &'static Character) -> Self {
        Self {
            id: c.id,
            name: c.name,
            emoji: c.emoji,
            short_description: c.short_description,
            intro_message: c.intro_message,
            archetype: c.archetype(),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_characters))
        .route("/{id}", get(get_character))
}

async fn list_characters() -> Json<Vec<CharacterCard>> {
    Json(lovegate_story::character::all().map(CharacterCard::from).collect())
}

async fn get_character(Path(id): Path<String>) -> Result<Json<CharacterCard>, ApiError> {
    let id: CharacterId = id.parse()?;
    Ok(Json(CharacterCard::from(id.character())))
}
