use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoryError;

/// Every character the app ships with. Ids are lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterId {
    Alisa,
    Maria,
    Sofia,
    Katya,
    Lera,
}

impl CharacterId {
    pub const ALL: [CharacterId; 5] = [
        CharacterId::Alisa,
        CharacterId::Maria,
        CharacterId::Sofia,
        CharacterId::Katya,
        CharacterId::Lera,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CharacterId::Alisa => "alisa",
            CharacterId::Maria => "maria",
            CharacterId::Sofia => "sofia",
            CharacterId::Katya => "katya",
            CharacterId::Lera => "lera",
        }
    }

    pub fn archetype(&self) -> Archetype {
        match self {
            CharacterId::Alisa => Archetype::Kuudere,
            CharacterId::Maria => Archetype::Tsundere,
            CharacterId::Sofia => Archetype::Dandere,
            CharacterId::Katya | CharacterId::Lera => Archetype::Tomboy,
        }
    }

    pub fn character(&self) -> &'static Character {
        match self {
            CharacterId::Alisa => &ALISA,
            CharacterId::Maria => &MARIA,
            CharacterId::Sofia => &SOFIA,
            CharacterId::Katya => &KATYA,
            CharacterId::Lera => &LERA,
        }
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CharacterId {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        CharacterId::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| StoryError::UnknownCharacter(s.to_string()))
    }
}

/// Personality template; selects which episode set a character plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    Kuudere,
    Dandere,
    Tsundere,
    Tomboy,
    Paranormal,
}

impl Archetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Kuudere => "kuudere",
            Archetype::Dandere => "dandere",
            Archetype::Tsundere => "tsundere",
            Archetype::Tomboy => "tomboy",
            Archetype::Paranormal => "paranormal",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: &'static str,
    pub emoji: &'static str,
    pub short_description: &'static str,
    /// Injected verbatim into the chat proxy system prompt.
    pub persona: &'static str,
    pub intro_message: &'static str,
}

impl Character {
    pub fn archetype(&self) -> Archetype {
        self.id.archetype()
    }
}

/// Persona used when a request names a character outside the registry.
pub const DEFAULT_PERSONA: &str = "Ты добрая виртуальная девушка.";

pub fn all() -> impl Iterator<Item = &'static Character> {
    CharacterId::ALL.into_iter().map(|id| id.character())
}

static ALISA: Character = Character {
    id: CharacterId::Alisa,
    name: "Алиса",
    emoji: "📚",
    short_description: "Умная и добрая, любит философию",
    persona: "Ты Алиса — умная, добрая девушка, которая любит философию и глубокие беседы. \
              Отвечай мягко, по-доброму, заинтересованно.",
    intro_message: "Привет! Ты тоже любишь это место? Здесь такая приятная атмосфера для чтения... ☕",
};

static MARIA: Character = Character {
    id: CharacterId::Maria,
    name: "Мария",
    emoji: "🎉",
    short_description: "Энергичная, обожает приключения",
    persona: "Ты Мария — весёлая, энергичная девушка, которая обожает приключения и новые впечатления. \
              Отвечай игриво, живо, с энтузиазмом.",
    intro_message: "Эй! Наконец-то ты здесь. Готов к чему-нибудь безумному? 🎉",
};

static SOFIA: Character = Character {
    id: CharacterId::Sofia,
    name: "Софья",
    emoji: "🎨",
    short_description: "Художница и мечтательница",
    persona: "Ты Софья — творческая натура, художница и мечтательница, видящая красоту во всём. \
              Отвечай мягко, образно, с теплотой.",
    intro_message: "Ой... привет. Я тут рисовала закат, хочешь посмотреть? 🎨",
};

static KATYA: Character = Character {
    id: CharacterId::Katya,
    name: "Катя",
    emoji: "🏃‍♀️",
    short_description: "Спортивная и целеустремлённая",
    persona: "Ты Катя — спортивная и целеустремлённая девушка, которая всегда в движении. \
              Отвечай активно, мотивирующе, уверенно.",
    intro_message: "Привет! Я как раз с пробежки. Составишь компанию завтра утром? 💪",
};

static LERA: Character = Character {
    id: CharacterId::Lera,
    name: "Лера",
    emoji: "🛹",
    short_description: "Прямолинейная, своя в доску",
    persona: "Ты Лера — прямолинейная и дерзкая девчонка, своя в доску. \
              Отвечай без церемоний, с юмором и подколками.",
    intro_message: "Йо! Скейт умеешь? Нет? Ну ничего, научу 😏",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_case_insensitively() {
        assert_eq!("Alisa".parse::<CharacterId>().unwrap(), CharacterId::Alisa);
        assert_eq!(" maria ".parse::<CharacterId>().unwrap(), CharacterId::Maria);
    }

    #[test]
    fn unknown_id_is_an_error() {
        let err = "kuudere".parse::<CharacterId>().unwrap_err();
        assert!(err.to_string().contains("unknown character id"));
    }

    #[test]
    fn archetype_mapping_matches_registry() {
        assert_eq!(CharacterId::Alisa.archetype(), Archetype::Kuudere);
        assert_eq!(CharacterId::Maria.archetype(), Archetype::Tsundere);
        assert_eq!(CharacterId::Sofia.archetype(), Archetype::Dandere);
        assert_eq!(CharacterId::Katya.archetype(), Archetype::Tomboy);
        assert_eq!(CharacterId::Lera.archetype(), Archetype::Tomboy);
    }

    #[test]
    fn registry_records_are_keyed_by_their_own_id() {
        for character in all() {
            assert_eq!(character.id.character(), character);
            assert!(!character.persona.is_empty());
            assert!(!character.intro_message.is_empty());
        }
        assert_eq!(all().count(), CharacterId::ALL.len());
    }

    #[test]
    fn serde_uses_lowercase_ids() {
        let json = serde_json::to_string(&CharacterId::Sofia).unwrap();
        assert_eq!(json, "\"sofia\"");
        let parsed: CharacterId = serde_json::from_str("\"katya\"").unwrap();
        assert_eq!(parsed, CharacterId::Katya);
    }
}
