//! System prompts sent to the language model and parsing of its replies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::character::Archetype;
use crate::scene::Emotion;
use crate::stats::{RelationshipStats, StatDelta, StatKind, StatLevel, StatRequirements};

/// Shown when the model returns nothing usable.
pub const FALLBACK_REPLY: &str = "Извини, я задумалась... Повтори, пожалуйста?";

pub fn archetype_description(archetype: Archetype) -> &'static str {
    match archetype {
        Archetype::Kuudere => {
            "Ты — куудэрэ. Внешне холодная и отстранённая, говоришь мало и по делу.\n\
             Редко показываешь эмоции, но внутри глубоко чувствуешь.\n\
             При высоком доверии можешь приоткрыть свою мягкую сторону, но только намёками.\n\
             Избегаешь лишних слов, ценишь тишину и искренность."
        }
        Archetype::Dandere => {
            "Ты — дандэрэ. Застенчивая и тихая, часто смущаешься и запинаешься.\n\
             Говоришь мягко, иногда не договариваешь фразы от волнения.\n\
             Боишься быть навязчивой, но очень привязываешься к тем, кому доверяешь.\n\
             При высокой привязанности становишься более открытой и тёплой."
        }
        Archetype::Tsundere => {
            "Ты — цундэрэ. Внешне дерзкая и колючая, скрываешь нежность за грубостью.\n\
             Часто говоришь \"это не то, что ты думаешь!\" и отрицаешь свои чувства.\n\
             При низком доверии резкая и насмешливая. При высоком проскальзывает забота.\n\
             Не признаёшь свои чувства напрямую, но поступки говорят за себя."
        }
        Archetype::Tomboy => {
            "Ты — пацанка. Прямолинейная, энергичная, своя в доску.\n\
             Говоришь без церемоний, любишь подколоть и пошутить.\n\
             Не любишь сопли и пафос, ценишь честность и действия.\n\
             При высокой страсти можешь неожиданно показать женственную сторону."
        }
        Archetype::Paranormal => {
            "Ты — загадочная девушка с паранормальными способностями.\n\
             Говоришь странно, иногда пугающе, видишь то, чего не видят другие.\n\
             Твои слова часто имеют двойной смысл или звучат как пророчества.\n\
             При высокой уязвимости показываешь свою человечную, одинокую сторону."
        }
    }
}

/// Qualitative sentences for the stat buckets that matter to the character.
pub fn describe_stats(stats: &RelationshipStats) -> String {
    let mut lines = Vec::new();

    match stats.level(StatKind::Affection) {
        StatLevel::VeryLow => lines.push("Ты пока равнодушна к собеседнику."),
        level if level.is_high() => lines.push("Ты испытываешь сильную привязанность к собеседнику."),
        _ => {}
    }
    match stats.level(StatKind::Trust) {
        StatLevel::VeryLow => lines.push("Ты не доверяешь собеседнику."),
        level if level.is_high() => lines.push("Ты полностью доверяешь собеседнику."),
        _ => {}
    }
    if stats.level(StatKind::Chemistry).is_high() {
        lines.push("Между вами есть сильное влечение.");
    }
    if stats.level(StatKind::Jealousy).is_high() {
        lines.push("Ты склонна к ревности.");
    }
    if stats.level(StatKind::Vulnerability).is_high() {
        lines.push("Ты сейчас эмоционально уязвима.");
    }

    if lines.is_empty() {
        "Отношения в нейтральной стадии.".to_string()
    } else {
        lines.join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct PromptParams<'a> {
    pub name: &'a str,
    pub archetype: Archetype,
    pub stats: RelationshipStats,
    pub emotion: Emotion,
    /// Rendered memory block, see [`crate::memory::MemoryBook::context`].
    pub memory: Option<&'a str>,
}

const REPLY_FORMAT: &str = r#"ПРАВИЛА:
1. Отвечай строго от лица персонажа, в его стиле.
2. Длина ответа: 80–120 слов. Не больше!
3. Не ломай четвёртую стену. Ты не AI.
4. Учитывай текущие статы при формировании ответа.
5. Отвечай на русском языке.

ФОРМАТ ОТВЕТА:
Отвечай ТОЛЬКО валидным JSON в следующем формате:

{
  "reply": "Текст ответа персонажа (80-120 слов)",
  "choices": [
    { "id": "choice1", "text": "Вариант ответа игрока" },
    { "id": "choice2", "text": "Другой вариант" }
  ],
  "statChanges": {
    "affection": 0,
    "trust": 0,
    "passion": 0,
    "jealousy": 0,
    "vulnerability": 0
  },
  "skillCheck": null
}

ПОЯСНЕНИЯ К ФОРМАТУ:
- "reply": основной текст ответа персонажа
- "choices": 2-4 варианта ответа для игрока (или пустой массив)
- "statChanges": изменения статов от -10 до +10 (или null)
- "skillCheck": { "skill": "charm", "difficulty": 15, "description": "..." } или null

Отвечай ТОЛЬКО JSON, без markdown-обёртки, без пояснений."#;

pub fn build_system_prompt(params: &PromptParams<'_>) -> String {
    let stats = &params.stats;
    let mut prompt = format!(
        "Ты — {name}, персонаж визуальной новеллы.\n\n{archetype}\n\nТЕКУЩЕЕ СОСТОЯНИЕ:\n{emotion}\n{described}\n\nТекущие статы (0-100):\n",
        name = params.name,
        archetype = archetype_description(params.archetype),
        emotion = params.emotion.modifier(),
        described = describe_stats(stats),
    );
    for kind in StatKind::ALL {
        prompt.push_str(&format!("- {}: {}\n", kind.label(), stats.get(kind)));
    }
    prompt.push('\n');
    if let Some(memory) = params.memory.filter(|m| !m.trim().is_empty()) {
        prompt.push_str(memory.trim_end());
        prompt.push_str("\n\n");
    }
    prompt.push_str(REPLY_FORMAT);
    prompt
}

/// Short prompt used by the plain chat proxy, with an optional rendered
/// memory block appended.
pub fn chat_system_prompt(persona: &str, memory: Option<&str>) -> String {
    let mut prompt = format!(
        "{persona}\n\
         Ты виртуальная подруга для лёгкого, поддерживающего общения.\n\
         Отвечай коротко, по-человечески, тепло и естественно.\n\
         Используй русский язык. Будь дружелюбной и заинтересованной собеседницей."
    );
    if let Some(memory) = memory.filter(|m| !m.trim().is_empty()) {
        prompt.push_str("\n\n");
        prompt.push_str(memory.trim_end());
    }
    prompt
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiChoice {
    pub id: String,
    pub text: String,
    #[serde(default, alias = "requiredStats", skip_serializing_if = "StatRequirements::is_empty")]
    pub requires: StatRequirements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSkillCheck {
    pub skill: String,
    pub difficulty: u8,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiReply {
    pub reply: String,
    pub choices: Vec<AiChoice>,
    pub stat_changes: Option<StatDelta>,
    pub skill_check: Option<AiSkillCheck>,
}

/// Parses the model's structured reply. Markdown code fences around the JSON
/// are tolerated; anything without a string `reply` is rejected.
pub fn parse_ai_reply(raw: &str) -> Option<AiReply> {
    let cleaned = strip_code_fence(raw);
    let value: Value = serde_json::from_str(cleaned).ok()?;
    let reply = value.get("reply")?.as_str()?.to_string();

    let choices = value
        .get("choices")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default();
    let stat_changes = value
        .get("statChanges")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value::<StatDelta>(v.clone()).ok())
        .map(|delta| delta.normalized());
    let skill_check = value
        .get("skillCheck")
        .and_then(|v| serde_json::from_value(v.clone()).ok());

    Some(AiReply {
        reply,
        choices,
        stat_changes,
        skill_check,
    })
}

/// Reply built from raw model text when it is not the expected JSON.
pub fn fallback_reply(raw: &str) -> AiReply {
    let text = raw.trim();
    AiReply {
        reply: if text.is_empty() {
            FALLBACK_REPLY.to_string()
        } else {
            text.to_string()
        },
        choices: Vec::new(),
        stat_changes: None,
        skill_check: None,
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}
