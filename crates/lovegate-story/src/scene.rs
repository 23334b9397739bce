use serde::{Deserialize, Serialize};

use crate::skill_check::SkillCheck;
use crate::stats::{RelationshipStats, StatDelta, StatRequirements};

/// Emotional tag of a scene; also selects the prompt's emotion modifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Flirty,
    Shy,
    Jealous,
    Worried,
    Excited,
    Tender,
}

impl Emotion {
    pub fn modifier(&self) -> &'static str {
        match self {
            Emotion::Neutral => "Сейчас ты в спокойном, нейтральном состоянии.",
            Emotion::Happy => "Сейчас ты в хорошем настроении, более открыта и игрива.",
            Emotion::Sad => "Сейчас тебе грустно, ты более замкнута и ранима.",
            Emotion::Angry => "Сейчас ты раздражена или злишься, отвечаешь резче.",
            Emotion::Flirty => "Сейчас ты в игривом настроении, можешь флиртовать.",
            Emotion::Shy => "Сейчас ты смущена, говоришь тише и неувереннее.",
            Emotion::Jealous => "Сейчас ты ревнуешь, это влияет на твои ответы.",
            Emotion::Worried => "Сейчас ты беспокоишься, проявляешь больше заботы.",
            Emotion::Excited => "Сейчас ты взволнована, говоришь энергичнее.",
            Emotion::Tender => "Сейчас ты чувствуешь нежность, более ласкова.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "StatDelta::is_zero")]
    pub delta: StatDelta,
    #[serde(default, skip_serializing_if = "StatRequirements::is_empty")]
    pub requires: StatRequirements,
    /// `None` ends the episode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl Choice {
    pub fn is_terminal(&self) -> bool {
        self.next.is_none()
    }
}

/// A choice as presented to the player, with its requirement status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceView<'a> {
    #[serde(flatten)]
    pub choice: &'a Choice,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub emotion: Emotion,
    /// Narrator line shown before the character speaks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    pub text: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_check: Option<SkillCheck>,
}

impl Scene {
    pub fn choice(&self, choice_id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == choice_id)
    }

    pub fn available_choices(&self, stats: &RelationshipStats) -> Vec<ChoiceView<'_>> {
        self.choices
            .iter()
            .map(|choice| ChoiceView {
                choice,
                locked: !stats.meets(&choice.requires),
            })
            .collect()
    }

    /// True when no choice leads anywhere.
    pub fn is_episode_end(&self) -> bool {
        self.choices.iter().all(Choice::is_terminal)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rewards {
    #[serde(default)]
    pub coins: u32,
    #[serde(default)]
    pub gems: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unlocked_episodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub rewards: Rewards,
}

impl Episode {
    pub fn first_scene(&self) -> Option<&Scene> {
        self.scenes.first()
    }

    pub fn scene(&self, scene_id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == scene_id)
    }
}
