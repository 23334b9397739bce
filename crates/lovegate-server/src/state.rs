use std::collections::HashMap;
use std::sync::Arc;

use lovegate_provider::{LlmProvider, DEEPSEEK_MODEL};
use lovegate_story::character::DEFAULT_PERSONA;
use lovegate_story::{CharacterId, StoryEngine};

#[derive(Clone)]
pub struct AppState {
    /// Upstream chat-completions client.
    pub provider: Arc<dyn LlmProvider>,
    /// Validated scene graphs, shared read-only.
    pub engine: Arc<StoryEngine>,
    /// Model name sent with every completion request.
    pub model: String,
    /// Persona text overrides from configuration, keyed by character.
    pub personas: Arc<HashMap<CharacterId, String>>,
}

impl AppState {
    pub fn new(provider: Arc<dyn LlmProvider>, engine: Arc<StoryEngine>) -> Self {
        Self {
            provider,
            engine,
            model: DEEPSEEK_MODEL.to_string(),
            personas: Arc::new(HashMap::new()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_personas(mut self, personas: HashMap<CharacterId, String>) -> Self {
        self.personas = Arc::new(personas);
        self
    }

    /// Persona for a raw character id; unknown ids get the generic persona.
    pub fn persona(&self, raw_id: &str) -> (Option<CharacterId>, &str) {
        match raw_id.parse::<CharacterId>() {
            Ok(id) => {
                let text = self
                    .personas
                    .get(&id)
                    .map(String::as_str)
                    .unwrap_or(id.character().persona);
                (Some(id), text)
            }
            Err(_) => {
                tracing::warn!(character = %raw_id, "unknown character, using default persona");
                (None, DEFAULT_PERSONA)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lovegate_provider::StubProvider;

    fn state() -> AppState {
        let engine = StoryEngine::builtin().expect("builtin stories");
        AppState::new(Arc::new(StubProvider), Arc::new(engine))
    }

    #[test]
    fn known_character_uses_registry_persona() {
        let state = state();
        let (id, persona) = state.persona("maria");
        assert_eq!(id, Some(CharacterId::Maria));
        assert!(persona.starts_with("Ты Мария"));
    }

    #[test]
    fn override_replaces_persona() {
        let state = state().with_personas(HashMap::from([(CharacterId::Alisa, "Ты Алиса, строгая.".to_string())]));
        assert_eq!(state.persona("Alisa").1, "Ты Алиса, строгая.");
        assert!(state.persona("sofia").1.starts_with("Ты Софья"));
    }

    #[test]
    fn unknown_character_falls_back() {
        let state = state();
        let (id, persona) = state.persona("nobody");
        assert!(id.is_none());
        assert_eq!(persona, DEFAULT_PERSONA);
    }
}
