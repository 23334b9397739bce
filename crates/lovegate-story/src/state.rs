//! Client game state: one explicit value the caller owns and saves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::character::CharacterId;
use crate::conversation::Conversation;
use crate::engine::StoryProgress;
use crate::memory::MemoryBook;
use crate::scene::Rewards;
use crate::stats::{Mood, RelationshipStats, StatDelta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub coins: u32,
    pub gems: u32,
}

impl Default for Currency {
    fn default() -> Self {
        Self { coins: 100, gems: 10 }
    }
}

impl Currency {
    pub fn add_coins(&mut self, amount: u32) {
        self.coins = self.coins.saturating_add(amount);
    }

    pub fn add_gems(&mut self, amount: u32) {
        self.gems = self.gems.saturating_add(amount);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    #[serde(default)]
    pub current_character: Option<CharacterId>,
    #[serde(default)]
    stats: BTreeMap<CharacterId, RelationshipStats>,
    #[serde(default)]
    moods: BTreeMap<CharacterId, Mood>,
    #[serde(default)]
    pub unlocked_scenes: Vec<String>,
    #[serde(default)]
    pub completed_scenes: Vec<String>,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    conversations: BTreeMap<CharacterId, Conversation>,
    #[serde(default)]
    progress: BTreeMap<CharacterId, StoryProgress>,
    #[serde(default)]
    pub memory: MemoryBook,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches to `character`, creating its stats on first contact.
    pub fn select_character(&mut self, character: CharacterId) {
        self.current_character = Some(character);
        self.stats.entry(character).or_insert_with(RelationshipStats::initial);
    }

    pub fn stats(&self, character: CharacterId) -> RelationshipStats {
        self.stats.get(&character).copied().unwrap_or_default()
    }

    pub fn mood(&self, character: CharacterId) -> Mood {
        self.moods.get(&character).copied().unwrap_or(Mood::Neutral)
    }

    /// Applies `delta` and recomputes mood from its direction.
    pub fn apply_delta(&mut self, character: CharacterId, delta: &StatDelta) -> RelationshipStats {
        let next = self.stats(character).apply(delta);
        self.stats.insert(character, next);
        self.moods.insert(character, next.mood(delta.interaction()));
        next
    }

    pub fn conversation(&self, character: CharacterId) -> Option<&Conversation> {
        self.conversations.get(&character)
    }

    pub fn conversation_mut(&mut self, character: CharacterId) -> &mut Conversation {
        self.conversations
            .entry(character)
            .or_insert_with(|| Conversation::new(character))
    }

    pub fn progress(&self, character: CharacterId) -> Option<&StoryProgress> {
        self.progress.get(&character)
    }

    pub fn set_progress(&mut self, progress: StoryProgress) {
        self.progress.insert(progress.character_id, progress);
    }

    pub fn unlock_scene(&mut self, scene_id: &str) {
        push_unique(&mut self.unlocked_scenes, scene_id);
    }

    pub fn complete_scene(&mut self, scene_id: &str) {
        push_unique(&mut self.completed_scenes, scene_id);
    }

    pub fn grant(&mut self, rewards: &Rewards) {
        self.currency.add_coins(rewards.coins);
        self.currency.add_gems(rewards.gems);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}

fn push_unique(list: &mut Vec<String>, id: &str) {
    if !list.iter().any(|s| s == id) {
        list.push(id.to_string());
    }
}
