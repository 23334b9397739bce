//! Terminal walk-through of a character's story against a local state file.

use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use lovegate_provider::{LlmProvider, LlmRequest};
use lovegate_story::scene::Episode;
use lovegate_story::skill_check::describe_chance;
use lovegate_story::{
    chat_system_prompt, Character, CharacterId, ChatMessage, ChoiceView, GameState, Importance, JsonFileStore,
    MemoryCategory, MessageKind, RelationshipStats, Scene, Sender, SkillCheckOutcome, StatKind, StatRequirements,
    StateStore, StoryEngine, StoryProgress,
};
use rand::Rng;

/// How long a line the player said stays in the character's memory.
const SAID_TTL_DAYS: i64 = 7;

/// Free-text chat during play; absent when no provider is configured.
pub struct ChatContext {
    pub provider: Arc<dyn LlmProvider>,
    pub model: String,
    pub persona: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Choice(usize),
    Roll,
    Say(String),
    Remember { key: String, value: String },
    Quit,
    Invalid,
}

pub fn parse_input(line: &str, choices: usize) -> Input {
    let line = line.trim();
    match line {
        "q" | "quit" | "exit" => return Input::Quit,
        "r" | "roll" => return Input::Roll,
        _ => {}
    }
    if let Some(fact) = line.strip_prefix('+') {
        return match fact.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => Input::Remember {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            },
            _ => Input::Invalid,
        };
    }
    if let Some(text) = line.strip_prefix('>') {
        let text = text.trim();
        return if text.is_empty() {
            Input::Invalid
        } else {
            Input::Say(text.to_string())
        };
    }
    match line.parse::<usize>() {
        Ok(n) if (1..=choices).contains(&n) => Input::Choice(n - 1),
        _ => Input::Invalid,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub stats: RelationshipStats,
    pub next_scene: Option<String>,
    pub finished_episode: Option<String>,
}

/// Saved progress when it still points at a known scene, otherwise a fresh start.
pub fn resume(engine: &StoryEngine, game: &GameState, character: CharacterId) -> StoryProgress {
    match game.progress(character) {
        Some(progress)
            if progress
                .current_scene
                .as_deref()
                .is_some_and(|id| engine.scene_by_id(character, id).is_some()) =>
        {
            progress.clone()
        }
        _ => engine.start_progress(character),
    }
}

/// Applies `choice_id` on `scene` to the game state and moves progress along.
/// Finishing an episode grants its rewards once and opens the first unlocked
/// episode, if any.
pub fn apply_choice(
    engine: &StoryEngine,
    game: &mut GameState,
    progress: &mut StoryProgress,
    scene: &Scene,
    choice_id: &str,
) -> Step {
    let character = progress.character_id;
    let advance = engine.advance(character, scene, choice_id);
    let stats = match advance.stat_delta {
        Some(delta) => game.apply_delta(character, &delta),
        None => game.stats(character),
    };
    game.complete_scene(&scene.id);

    let mut next_scene = advance.next_scene.map(|s| s.id.clone());
    let mut finished_episode = None;
    if advance.episode_ended {
        if let Some(episode) = engine.episode_of_scene(character, &scene.id) {
            if progress.complete_episode(&episode.id) {
                game.grant(&episode.rewards);
            }
            finished_episode = Some(episode.id.clone());
            let opened = episode
                .rewards
                .unlocked_episodes
                .iter()
                .find_map(|id| engine.episode(character, id));
            progress.current_episode = opened.map(|e| e.id.clone());
            next_scene = opened.and_then(Episode::first_scene).map(|s| s.id.clone());
        }
    }

    if let Some(next) = &next_scene {
        game.unlock_scene(next);
    }
    progress.advance(&scene.id, next_scene.as_deref());
    game.set_progress(progress.clone());

    Step {
        stats,
        next_scene,
        finished_episode,
    }
}

pub fn roll_check<R: Rng + ?Sized>(
    game: &mut GameState,
    character: CharacterId,
    scene: &Scene,
    rng: &mut R,
) -> Option<SkillCheckOutcome> {
    let check = scene.skill_check.as_ref()?;
    let outcome = check.resolve(&game.stats(character), rng);
    game.apply_delta(character, &outcome.stat_delta);
    game.conversation_mut(character)
        .push(ChatMessage::new(Sender::System, outcome.text.clone()).with_kind(MessageKind::SkillCheck));
    Some(outcome)
}

pub fn render_scene(character: &Character, scene: &Scene, choices: &[ChoiceView<'_>], stats: &RelationshipStats) -> String {
    let mut out = String::new();
    if !scene.title.is_empty() {
        let _ = writeln!(out, "\n== {} ==", scene.title);
    }
    if let Some(narration) = &scene.narration {
        let _ = writeln!(out, "{narration}");
    }
    let _ = writeln!(out, "{} {}: {}", character.emoji, character.name, scene.text);
    if let Some(check) = &scene.skill_check {
        let chance = check.chance(stats);
        let _ = writeln!(
            out,
            "🎲 {} [{} {}%: {}] (r)",
            check.description,
            check.stat.label(),
            chance,
            describe_chance(chance)
        );
    }
    for (i, view) in choices.iter().enumerate() {
        let lock = if view.locked { " 🔒" } else { "" };
        let _ = writeln!(out, "  {}. {}{}", i + 1, view.choice.text, lock);
    }
    out
}

pub fn render_stats(stats: &RelationshipStats) -> String {
    let tier = stats.relationship_tier();
    let parts: Vec<String> = StatKind::ALL
        .iter()
        .map(|kind| format!("{} {}", kind.label(), stats.get(*kind)))
        .collect();
    format!("{} | {}", tier.name, parts.join(", "))
}

pub fn render_requirements(requires: &StatRequirements) -> String {
    StatKind::ALL
        .iter()
        .filter_map(|kind| requires.get(*kind).map(|v| format!("{} {v}+", kind.label())))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The request for one free-text line: persona, current mood and whatever the
/// character remembers about the player.
pub fn chat_request(
    chat: &ChatContext,
    game: &GameState,
    character: CharacterId,
    text: &str,
    now: DateTime<Utc>,
) -> LlmRequest {
    let persona = format!("{}\n{}", chat.persona, game.mood(character).modifier());
    let memory = game.memory.prompt_context(character, now);
    let system = chat_system_prompt(&persona, memory.as_deref());
    LlmRequest::simple(chat.model.clone(), Some(system), text)
}

pub fn record_said(game: &mut GameState, character: CharacterId, text: &str, now: DateTime<Utc>) {
    game.memory.remember(
        character,
        MemoryCategory::Shared,
        "из разговора",
        text,
        Importance::Low,
        Some(now + Duration::days(SAID_TTL_DAYS)),
    );
}

async fn say(chat: &ChatContext, game: &mut GameState, character: CharacterId, text: String) {
    let now = Utc::now();
    let request = chat_request(chat, game, character, &text, now);
    let ticket = game.conversation_mut(character).push_user(text.clone());
    record_said(game, character, &text, now);
    match chat.provider.chat(request).await {
        Ok(resp) => {
            game.conversation_mut(character).accept_reply(ticket, resp.text.clone());
            println!("{}: {}", character.character().name, resp.text);
        }
        Err(err) => {
            tracing::warn!(character = %character, "chat failed: {err:#}");
            game.conversation_mut(character).fail_reply(ticket, None);
            if let Some(line) = game.conversation(character).and_then(|c| c.last()) {
                println!("{}: {}", character.character().name, line.text);
            }
        }
    }
}

fn read_line() -> Result<Option<String>> {
    print!("> ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    if std::io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input))
}

pub async fn run(
    engine: &StoryEngine,
    store: &JsonFileStore,
    chat: Option<ChatContext>,
    character: CharacterId,
) -> Result<()> {
    let mut game = store.load_or_default().await?;
    game.select_character(character);
    let expired = game.memory.prune_expired(Utc::now());
    if expired > 0 {
        tracing::debug!(expired, "dropped expired memory facts");
    }
    let mut progress = resume(engine, &game, character);
    let profile = character.character();

    if game.conversation(character).map_or(true, |c| c.is_empty()) {
        game.conversation_mut(character)
            .push(ChatMessage::new(Sender::Character, profile.intro_message));
        println!("{} {}: {}", profile.emoji, profile.name, profile.intro_message);
    }
    println!("Числа выбирают вариант, r бросает проверку, > текст пишет ей, + ключ: значение запоминает факт, q выходит.");

    'scenes: loop {
        let Some(scene_id) = progress.current_scene.clone() else {
            println!("Продолжение следует...");
            break;
        };
        let Some(scene) = engine.scene_by_id(character, &scene_id) else {
            tracing::warn!(character = %character, scene = %scene_id, "saved scene no longer exists");
            break;
        };

        let stats = game.stats(character);
        let views = engine.available_choices(scene, &stats);
        print!("{}", render_scene(profile, scene, &views, &stats));
        if let Some(narration) = &scene.narration {
            game.conversation_mut(character).push_narration(narration.clone());
        }
        let mut rolled = false;

        loop {
            let Some(line) = read_line()? else {
                break 'scenes;
            };
            match parse_input(&line, views.len()) {
                Input::Quit => break 'scenes,
                Input::Roll if rolled || scene.skill_check.is_none() => println!("Здесь нечего проверять."),
                Input::Roll => {
                    if let Some(outcome) = roll_check(&mut game, character, scene, &mut rand::thread_rng()) {
                        println!("{}\n{}", outcome.result.summary(), outcome.text);
                        println!("{}", render_stats(&game.stats(character)));
                    }
                    rolled = true;
                }
                Input::Say(text) => match &chat {
                    Some(chat) => {
                        say(chat, &mut game, character, text).await;
                        store.save(&game).await?;
                    }
                    None => println!("Чат недоступен: провайдер не настроен."),
                },
                Input::Remember { key, value } => {
                    game.memory
                        .remember(character, MemoryCategory::UserInfo, key, value, Importance::High, None);
                    store.save(&game).await?;
                    println!("{} запомнила.", profile.name);
                }
                Input::Choice(i) => {
                    let view = &views[i];
                    if view.locked {
                        println!("🔒 Нужно: {}", render_requirements(&view.choice.requires));
                        continue;
                    }
                    let step = apply_choice(engine, &mut game, &mut progress, scene, &view.choice.id);
                    println!("{}", render_stats(&step.stats));
                    if let Some(episode) = step.finished_episode {
                        println!("Эпизод {episode} завершён. Монеты: {}, кристаллы: {}", game.currency.coins, game.currency.gems);
                    }
                    store.save(&game).await?;
                    continue 'scenes;
                }
                Input::Invalid => println!("Выбери номер от 1 до {}.", views.len()),
            }
        }
    }

    store.save(&game).await?;
    tracing::info!(character = %character, path = %store.path().display(), "progress saved");
    Ok(())
}
