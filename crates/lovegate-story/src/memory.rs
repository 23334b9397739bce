//! Facts a character remembers about the player, rendered into prompts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::character::CharacterId;

pub const DEFAULT_MAX_FACTS: usize = 10;

const EMPTY_MEMORY: &str = "Ты пока ничего не знаешь о собеседнике.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    UserInfo,
    Preferences,
    Events,
    Emotions,
    Promises,
    Shared,
}

impl MemoryCategory {
    pub fn label(&self) -> &'static str {
        match self {
            MemoryCategory::UserInfo => "О собеседнике",
            MemoryCategory::Preferences => "Предпочтения",
            MemoryCategory::Events => "Важные события",
            MemoryCategory::Emotions => "Эмоциональные моменты",
            MemoryCategory::Promises => "Твои обещания",
            MemoryCategory::Shared => "Общие воспоминания",
        }
    }
}

// Declaration order is the sort order: high sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryFact {
    pub id: Uuid,
    pub character_id: CharacterId,
    pub category: MemoryCategory,
    pub key: String,
    pub value: String,
    pub importance: Importance,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl MemoryFact {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBook {
    #[serde(default)]
    facts: Vec<MemoryFact>,
}

impl MemoryBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_facts(facts: Vec<MemoryFact>) -> Self {
        Self { facts }
    }

    pub fn remember(
        &mut self,
        character_id: CharacterId,
        category: MemoryCategory,
        key: impl Into<String>,
        value: impl Into<String>,
        importance: Importance,
        expires_at: Option<DateTime<Utc>>,
    ) -> Uuid {
        let fact = MemoryFact {
            id: Uuid::new_v4(),
            character_id,
            category,
            key: key.into(),
            value: value.into(),
            importance,
            created_at: Utc::now(),
            expires_at,
        };
        let id = fact.id;
        self.facts.push(fact);
        id
    }

    pub fn forget(&mut self, id: Uuid) -> bool {
        let before = self.facts.len();
        self.facts.retain(|f| f.id != id);
        self.facts.len() != before
    }

    pub fn facts(&self) -> &[MemoryFact] {
        &self.facts
    }

    pub fn by_category(&self, character_id: CharacterId, category: MemoryCategory) -> Vec<&MemoryFact> {
        self.facts
            .iter()
            .filter(|f| f.character_id == character_id && f.category == category)
            .collect()
    }

    /// Unexpired facts for one character.
    pub fn active(&self, character_id: CharacterId, now: DateTime<Utc>) -> Vec<&MemoryFact> {
        self.facts
            .iter()
            .filter(|f| f.character_id == character_id && f.is_active(now))
            .collect()
    }

    /// Drops expired facts and returns how many were removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.facts.len();
        self.facts.retain(|f| f.is_active(now));
        before - self.facts.len()
    }

    /// Renders up to `max_facts` facts, most important and then newest first,
    /// grouped by category in order of first appearance.
    pub fn context(&self, character_id: CharacterId, max_facts: usize, now: DateTime<Utc>) -> String {
        let mut facts = self.active(character_id, now);
        facts.sort_by(|a, b| {
            a.importance
                .cmp(&b.importance)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        facts.truncate(max_facts);

        if facts.is_empty() {
            return EMPTY_MEMORY.to_string();
        }

        let mut groups: Vec<(MemoryCategory, Vec<&MemoryFact>)> = Vec::new();
        for fact in facts {
            match groups.iter_mut().find(|(category, _)| *category == fact.category) {
                Some((_, members)) => members.push(fact),
                None => groups.push((fact.category, vec![fact])),
            }
        }

        let mut out = String::from("Что ты помнишь о собеседнике:\n");
        for (category, members) in groups {
            out.push_str(&format!("\n{}:\n", category.label()));
            for fact in members {
                out.push_str(&format!("- {}: {}\n", fact.key, fact.value));
            }
        }
        out
    }

    /// The context block for a prompt, or `None` while nothing is remembered
    /// about the player.
    pub fn prompt_context(&self, character_id: CharacterId, now: DateTime<Utc>) -> Option<String> {
        if self.active(character_id, now).is_empty() {
            return None;
        }
        Some(self.context(character_id, DEFAULT_MAX_FACTS, now))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn fact(category: MemoryCategory, key: &str, importance: Importance, age_secs: i64) -> MemoryFact {
        MemoryFact {
            id: Uuid::new_v4(),
            character_id: CharacterId::Alisa,
            category,
            key: key.into(),
            value: "v".into(),
            importance,
            created_at: Utc::now() - Duration::seconds(age_secs),
            expires_at: None,
        }
    }

    #[test]
    fn empty_book_has_placeholder_context() {
        let book = MemoryBook::new();
        assert_eq!(book.context(CharacterId::Alisa, DEFAULT_MAX_FACTS, Utc::now()), EMPTY_MEMORY);
    }

    #[test]
    fn context_orders_by_importance_then_recency() {
        let book = MemoryBook {
            facts: vec![
                fact(MemoryCategory::Preferences, "old-low", Importance::Low, 100),
                fact(MemoryCategory::UserInfo, "name", Importance::High, 50),
                fact(MemoryCategory::Preferences, "music", Importance::Medium, 10),
                fact(MemoryCategory::Preferences, "food", Importance::Medium, 1),
            ],
        };
        let text = book.context(CharacterId::Alisa, 3, Utc::now());
        assert!(text.starts_with("Что ты помнишь о собеседнике:\n"));
        let name = text.find("- name").unwrap();
        let food = text.find("- food").unwrap();
        let music = text.find("- music").unwrap();
        assert!(name < food && food < music);
        assert!(!text.contains("old-low"));
        assert!(text.contains("О собеседнике:"));
        assert!(text.contains("Предпочтения:"));
    }

    #[test]
    fn expired_facts_are_hidden_and_pruned() {
        let mut book = MemoryBook::new();
        let now = Utc::now();
        book.remember(
            CharacterId::Alisa,
            MemoryCategory::Promises,
            "call",
            "позвонить",
            Importance::High,
            Some(now - Duration::minutes(1)),
        );
        book.remember(CharacterId::Maria, MemoryCategory::Shared, "roof", "крыша", Importance::Low, None);

        assert!(book.active(CharacterId::Alisa, now).is_empty());
        assert_eq!(book.active(CharacterId::Maria, now).len(), 1);
        assert_eq!(book.prune_expired(now), 1);
        assert_eq!(book.facts().len(), 1);
    }

    #[test]
    fn prompt_context_only_for_known_facts() {
        let mut book = MemoryBook::new();
        assert!(book.prompt_context(CharacterId::Lera, Utc::now()).is_none());

        book.remember(CharacterId::Lera, MemoryCategory::UserInfo, "имя", "Дима", Importance::High, None);
        let text = book.prompt_context(CharacterId::Lera, Utc::now()).unwrap();
        assert!(text.contains("- имя: Дима"));
        assert!(book.prompt_context(CharacterId::Katya, Utc::now()).is_none());
    }

    #[test]
    fn forget_removes_by_id() {
        let mut book = MemoryBook::new();
        let id = book.remember(CharacterId::Sofia, MemoryCategory::Events, "k", "v", Importance::Medium, None);
        assert_eq!(book.by_category(CharacterId::Sofia, MemoryCategory::Events).len(), 1);
        assert!(book.forget(id));
        assert!(!book.forget(id));
    }
}
