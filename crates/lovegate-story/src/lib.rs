//! Story, relationship-state and skill-check engine for Lovegate characters.
//!
//! Everything here is pure data transformation over static content except
//! [`store`], which owns the JSON save/load boundary for client state.

pub mod character;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod memory;
pub mod prompt;
pub mod scene;
pub mod skill_check;
pub mod state;
pub mod stats;
pub mod store;

pub use character::{Archetype, Character, CharacterId};
pub use conversation::{ChatMessage, Conversation, MessageKind, ReplyTicket, Sender};
pub use engine::{Advance, StoryEngine, StoryProgress};
pub use error::StoryError;
pub use memory::{Importance, MemoryBook, MemoryCategory, MemoryFact};
pub use prompt::{
    build_system_prompt, chat_system_prompt, fallback_reply, parse_ai_reply, AiChoice, AiReply, PromptParams,
};
pub use scene::{Choice, ChoiceView, Emotion, Episode, Rewards, Scene};
pub use skill_check::{Difficulty, SkillCheck, SkillCheckOutcome, SkillCheckResult};
pub use state::{Currency, GameState};
pub use stats::{
    Interaction, Mood, RelationshipStats, RelationshipTier, StatDelta, StatKind, StatLevel, StatRequirements,
};
pub use store::{JsonFileStore, StateStore};
