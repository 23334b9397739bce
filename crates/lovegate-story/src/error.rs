use thiserror::Error;

use crate::character::{Archetype, CharacterId};

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("unknown character id: {0}")]
    UnknownCharacter(String),
    #[error("no scenes registered for character {0}")]
    EmptyStory(CharacterId),
    #[error("episode {episode} of {archetype} has no scenes")]
    EmptyEpisode { archetype: Archetype, episode: String },
    #[error("duplicate scene id {scene} in {archetype}")]
    DuplicateScene { archetype: Archetype, scene: String },
    #[error("choice {choice} in scene {scene} points at missing scene {target}")]
    DanglingReference {
        scene: String,
        choice: String,
        target: String,
    },
    #[error("failed to parse episode data: {0}")]
    Parse(#[from] serde_yaml::Error),
}
