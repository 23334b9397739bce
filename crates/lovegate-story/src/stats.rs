//! Relationship stats and the pure operations over them.
//!
//! Every way of producing a [`RelationshipStats`] (construction through
//! [`RelationshipStats::apply`], deserialization) clamps into
//! `STAT_MIN..=STAT_MAX`. Applying deltas is order independent except where
//! an intermediate value hits 0 or 100: `apply(apply(s, +20), -20)` on a stat
//! at 90 yields 80, the reverse order yields 90.

use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

pub const STAT_MIN: u8 = 0;
pub const STAT_MAX: u8 = 100;

/// Bound for a single stat change proposed by the language model.
pub const MAX_MODEL_DELTA: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Affection,
    Trust,
    #[serde(alias = "passion")]
    Chemistry,
    Jealousy,
    Vulnerability,
}

impl StatKind {
    pub const ALL: [StatKind; 5] = [
        StatKind::Affection,
        StatKind::Trust,
        StatKind::Chemistry,
        StatKind::Jealousy,
        StatKind::Vulnerability,
    ];

    /// Russian label shown in stat bars and prompts.
    pub fn label(&self) -> &'static str {
        match self {
            StatKind::Affection => "Привязанность",
            StatKind::Trust => "Доверие",
            StatKind::Chemistry => "Страсть",
            StatKind::Jealousy => "Ревность",
            StatKind::Vulnerability => "Уязвимость",
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatKind::Affection => "affection",
            StatKind::Trust => "trust",
            StatKind::Chemistry => "chemistry",
            StatKind::Jealousy => "jealousy",
            StatKind::Vulnerability => "vulnerability",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawStats")]
pub struct RelationshipStats {
    pub affection: u8,
    pub trust: u8,
    pub chemistry: u8,
    pub jealousy: u8,
    pub vulnerability: u8,
}

#[derive(Deserialize)]
struct RawStats {
    affection: f64,
    trust: f64,
    #[serde(alias = "passion")]
    chemistry: f64,
    jealousy: f64,
    vulnerability: f64,
}

impl From<RawStats> for RelationshipStats {
    fn from(raw: RawStats) -> Self {
        Self {
            affection: clamp_value(raw.affection),
            trust: clamp_value(raw.trust),
            chemistry: clamp_value(raw.chemistry),
            jealousy: clamp_value(raw.jealousy),
            vulnerability: clamp_value(raw.vulnerability),
        }
    }
}

impl Default for RelationshipStats {
    fn default() -> Self {
        Self::initial()
    }
}

impl RelationshipStats {
    /// Values a relationship starts from on first interaction.
    pub const fn initial() -> Self {
        Self {
            affection: 10,
            trust: 10,
            chemistry: 10,
            jealousy: 5,
            vulnerability: 10,
        }
    }

    pub fn get(&self, kind: StatKind) -> u8 {
        match kind {
            StatKind::Affection => self.affection,
            StatKind::Trust => self.trust,
            StatKind::Chemistry => self.chemistry,
            StatKind::Jealousy => self.jealousy,
            StatKind::Vulnerability => self.vulnerability,
        }
    }

    pub fn set(&mut self, kind: StatKind, value: f64) {
        let value = clamp_value(value);
        match kind {
            StatKind::Affection => self.affection = value,
            StatKind::Trust => self.trust = value,
            StatKind::Chemistry => self.chemistry = value,
            StatKind::Jealousy => self.jealousy = value,
            StatKind::Vulnerability => self.vulnerability = value,
        }
    }

    pub fn apply(&self, delta: &StatDelta) -> RelationshipStats {
        let mut next = *self;
        for kind in StatKind::ALL {
            let change = delta.get(kind).unwrap_or(0.0);
            next.set(kind, f64::from(self.get(kind)) + change);
        }
        next
    }

    /// Mean of affection, trust and chemistry.
    pub fn mean(&self) -> f64 {
        (f64::from(self.affection) + f64::from(self.trust) + f64::from(self.chemistry)) / 3.0
    }

    pub fn average(&self) -> u8 {
        clamp_value(self.mean())
    }

    pub fn meets(&self, requirements: &StatRequirements) -> bool {
        StatKind::ALL.into_iter().all(|kind| match requirements.get(kind) {
            Some(min) => self.get(kind) >= min,
            None => true,
        })
    }

    pub fn level(&self, kind: StatKind) -> StatLevel {
        StatLevel::from_value(self.get(kind))
    }

    pub fn relationship_tier(&self) -> RelationshipTier {
        RelationshipTier::for_mean(self.mean())
    }

    pub fn mood(&self, recent: Interaction) -> Mood {
        match recent {
            Interaction::Negative if self.trust < 30 => Mood::Annoyed,
            Interaction::Negative => Mood::Sad,
            Interaction::Positive if self.chemistry > 50 => Mood::Flirty,
            Interaction::Positive => Mood::Excited,
            Interaction::Neutral => {
                let mean = self.mean();
                if mean >= 70.0 {
                    Mood::Happy
                } else if mean >= 40.0 {
                    Mood::Neutral
                } else if mean >= 20.0 {
                    Mood::Sad
                } else {
                    Mood::Annoyed
                }
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Returns `None` when the payload is not JSON or lacks a numeric field.
    pub fn from_json(data: &str) -> Option<Self> {
        serde_json::from_str(data).ok()
    }
}

/// Rounds to the nearest integer and clamps into the stat range.
pub fn clamp_value(value: f64) -> u8 {
    if value.is_nan() {
        return STAT_MIN;
    }
    value
        .round()
        .clamp(f64::from(STAT_MIN), f64::from(STAT_MAX)) as u8
}

/// Signed change per stat. Fields that are missing or not numbers are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatDelta {
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub affection: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub trust: Option<f64>,
    #[serde(
        default,
        alias = "passion",
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub chemistry: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub jealousy: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub vulnerability: Option<f64>,
}

impl StatDelta {
    pub fn get(&self, kind: StatKind) -> Option<f64> {
        match kind {
            StatKind::Affection => self.affection,
            StatKind::Trust => self.trust,
            StatKind::Chemistry => self.chemistry,
            StatKind::Jealousy => self.jealousy,
            StatKind::Vulnerability => self.vulnerability,
        }
    }

    pub fn with(mut self, kind: StatKind, value: f64) -> Self {
        let slot = match kind {
            StatKind::Affection => &mut self.affection,
            StatKind::Trust => &mut self.trust,
            StatKind::Chemistry => &mut self.chemistry,
            StatKind::Jealousy => &mut self.jealousy,
            StatKind::Vulnerability => &mut self.vulnerability,
        };
        *slot = Some(value);
        self
    }

    pub fn is_zero(&self) -> bool {
        StatKind::ALL
            .into_iter()
            .all(|kind| self.get(kind).unwrap_or(0.0) == 0.0)
    }

    /// Rounds each present field and bounds it to `±MAX_MODEL_DELTA`.
    pub fn normalized(&self) -> StatDelta {
        let mut out = StatDelta::default();
        for kind in StatKind::ALL {
            if let Some(value) = self.get(kind) {
                out = out.with(kind, value.round().clamp(-MAX_MODEL_DELTA, MAX_MODEL_DELTA));
            }
        }
        out
    }

    /// Direction of the affection + trust + chemistry change.
    pub fn interaction(&self) -> Interaction {
        let sum = self.affection.unwrap_or(0.0)
            + self.trust.unwrap_or(0.0)
            + self.chemistry.unwrap_or(0.0);
        if sum > 0.0 {
            Interaction::Positive
        } else if sum < 0.0 {
            Interaction::Negative
        } else {
            Interaction::Neutral
        }
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Number(f64),
        Other(IgnoredAny),
    }

    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Number(n) if n.is_finite() => Some(n),
        _ => None,
    })
}

/// Minimum stat values a choice or scene asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affection: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust: Option<u8>,
    #[serde(default, alias = "passion", skip_serializing_if = "Option::is_none")]
    pub chemistry: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jealousy: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerability: Option<u8>,
}

impl StatRequirements {
    pub fn get(&self, kind: StatKind) -> Option<u8> {
        match kind {
            StatKind::Affection => self.affection,
            StatKind::Trust => self.trust,
            StatKind::Chemistry => self.chemistry,
            StatKind::Jealousy => self.jealousy,
            StatKind::Vulnerability => self.vulnerability,
        }
    }

    pub fn is_empty(&self) -> bool {
        StatKind::ALL.into_iter().all(|kind| self.get(kind).is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl StatLevel {
    pub fn from_value(value: u8) -> Self {
        match value {
            0..=19 => StatLevel::VeryLow,
            20..=39 => StatLevel::Low,
            40..=59 => StatLevel::Medium,
            60..=79 => StatLevel::High,
            _ => StatLevel::VeryHigh,
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, StatLevel::High | StatLevel::VeryHigh)
    }
}

const RELATIONSHIP_TIERS: [(u8, &str); 5] = [
    (0, "Незнакомцы"),
    (20, "Знакомые"),
    (40, "Приятели"),
    (60, "Друзья"),
    (80, "Лучшие друзья"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipTier {
    pub level: usize,
    pub name: &'static str,
    pub next_threshold: Option<u8>,
}

impl RelationshipTier {
    fn for_mean(mean: f64) -> Self {
        let level = RELATIONSHIP_TIERS
            .iter()
            .rposition(|(threshold, _)| mean >= f64::from(*threshold))
            .unwrap_or(0);
        Self {
            level,
            name: RELATIONSHIP_TIERS[level].1,
            next_threshold: RELATIONSHIP_TIERS.get(level + 1).map(|(t, _)| *t),
        }
    }

    pub fn is_top(&self) -> bool {
        self.next_threshold.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Neutral,
    Sad,
    Flirty,
    Annoyed,
    Excited,
}

impl Mood {
    pub fn modifier(&self) -> &'static str {
        match self {
            Mood::Happy => "Ты в отличном настроении, отвечай тепло и радостно.",
            Mood::Neutral => "Ты в нейтральном настроении, отвечай спокойно и дружелюбно.",
            Mood::Sad => "Ты немного грустишь, отвечай более сдержанно.",
            Mood::Flirty => "Ты в игривом настроении, можешь флиртовать и шутить.",
            Mood::Annoyed => "Ты слегка раздражена, отвечай короче и суше.",
            Mood::Excited => "Ты в восторге, отвечай с энтузиазмом и энергией!",
        }
    }
}
