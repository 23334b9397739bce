//! Scene-graph traversal over validated episode data.
//!
//! Episodes are grouped by [`Archetype`]; a character plays the episodes of
//! its archetype. All content is checked when the engine is built, so
//! traversal only has to cope with caller mistakes (unknown choice ids).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::character::{Archetype, CharacterId};
use crate::error::StoryError;
use crate::scene::{ChoiceView, Episode, Scene};
use crate::stats::{RelationshipStats, StatDelta};

const BUILTIN_STORIES: [&str; 4] = [
    include_str!("../data/kuudere.yaml"),
    include_str!("../data/tsundere.yaml"),
    include_str!("../data/dandere.yaml"),
    include_str!("../data/tomboy.yaml"),
];

#[derive(Debug, Deserialize)]
struct StoryFile {
    archetype: Archetype,
    episodes: Vec<Episode>,
}

/// Outcome of picking a choice on a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance<'a> {
    pub next_scene: Option<&'a Scene>,
    pub stat_delta: Option<StatDelta>,
    pub episode_ended: bool,
}

impl Advance<'_> {
    fn ended(stat_delta: Option<StatDelta>) -> Self {
        Self {
            next_scene: None,
            stat_delta,
            episode_ended: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoryEngine {
    stories: HashMap<Archetype, Vec<Episode>>,
}

impl StoryEngine {
    /// Engine over the episodes compiled into the crate.
    pub fn builtin() -> Result<Self, StoryError> {
        Self::from_yaml_sources(BUILTIN_STORIES)
    }

    /// Parses one YAML document per source. Sources sharing an archetype are
    /// concatenated in order.
    pub fn from_yaml_sources<'a, I>(sources: I) -> Result<Self, StoryError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut stories: HashMap<Archetype, Vec<Episode>> = HashMap::new();
        for source in sources {
            let file: StoryFile = serde_yaml::from_str(source)?;
            stories.entry(file.archetype).or_default().extend(file.episodes);
        }
        Self::from_episodes(stories)
    }

    pub fn from_episodes(stories: HashMap<Archetype, Vec<Episode>>) -> Result<Self, StoryError> {
        for (archetype, episodes) in &stories {
            validate(*archetype, episodes)?;
        }
        let scene_count: usize = stories
            .values()
            .flat_map(|eps| eps.iter().map(|e| e.scenes.len()))
            .sum();
        tracing::debug!(archetypes = stories.len(), scenes = scene_count, "story content loaded");
        Ok(Self { stories })
    }

    pub fn episodes(&self, character: CharacterId) -> &[Episode] {
        self.stories
            .get(&character.archetype())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn initial_episode(&self, character: CharacterId) -> Option<&Episode> {
        self.episodes(character).first()
    }

    pub fn episode(&self, character: CharacterId, episode_id: &str) -> Option<&Episode> {
        self.episodes(character).iter().find(|e| e.id == episode_id)
    }

    /// Episode that contains `scene_id`.
    pub fn episode_of_scene(&self, character: CharacterId, scene_id: &str) -> Option<&Episode> {
        self.episodes(character)
            .iter()
            .find(|e| e.scene(scene_id).is_some())
    }

    pub fn initial_scene(&self, character: CharacterId) -> Result<&Scene, StoryError> {
        self.initial_episode(character)
            .and_then(Episode::first_scene)
            .ok_or(StoryError::EmptyStory(character))
    }

    pub fn scene_by_id(&self, character: CharacterId, scene_id: &str) -> Option<&Scene> {
        self.scenes(character).find(|s| s.id == scene_id)
    }

    pub fn scene_ids(&self, character: CharacterId) -> Vec<&str> {
        self.scenes(character).map(|s| s.id.as_str()).collect()
    }

    fn scenes(&self, character: CharacterId) -> impl Iterator<Item = &Scene> {
        self.episodes(character).iter().flat_map(|e| e.scenes.iter())
    }

    pub fn available_choices<'s>(&self, scene: &'s Scene, stats: &RelationshipStats) -> Vec<ChoiceView<'s>> {
        scene.available_choices(stats)
    }

    pub fn advance(&self, character: CharacterId, current: &Scene, choice_id: &str) -> Advance<'_> {
        let Some(choice) = current.choice(choice_id) else {
            tracing::warn!(
                character = %character,
                scene = %current.id,
                choice = %choice_id,
                "choice not found on scene"
            );
            return Advance::ended(None);
        };

        let delta = Some(choice.delta);
        let Some(target) = choice.next.as_deref() else {
            return Advance::ended(delta);
        };

        match self.scene_by_id(character, target) {
            Some(next) => Advance {
                next_scene: Some(next),
                stat_delta: delta,
                episode_ended: false,
            },
            None => {
                tracing::warn!(
                    character = %character,
                    scene = %current.id,
                    choice = %choice.id,
                    target = %target,
                    "next scene does not exist, ending episode"
                );
                Advance::ended(delta)
            }
        }
    }

    pub fn start_progress(&self, character: CharacterId) -> StoryProgress {
        let episode = self.initial_episode(character);
        StoryProgress::new(
            character,
            episode.map(|e| e.id.clone()),
            episode.and_then(Episode::first_scene).map(|s| s.id.clone()),
        )
    }
}

fn validate(archetype: Archetype, episodes: &[Episode]) -> Result<(), StoryError> {
    let mut ids = HashSet::new();
    for episode in episodes {
        if episode.scenes.is_empty() {
            return Err(StoryError::EmptyEpisode {
                archetype,
                episode: episode.id.clone(),
            });
        }
        for scene in &episode.scenes {
            if !ids.insert(scene.id.as_str()) {
                return Err(StoryError::DuplicateScene {
                    archetype,
                    scene: scene.id.clone(),
                });
            }
        }
    }

    for scene in episodes.iter().flat_map(|e| e.scenes.iter()) {
        for choice in &scene.choices {
            if let Some(target) = choice.next.as_deref() {
                if !ids.contains(target) {
                    return Err(StoryError::DanglingReference {
                        scene: scene.id.clone(),
                        choice: choice.id.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Where a player is in a character's story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryProgress {
    pub character_id: CharacterId,
    pub current_episode: Option<String>,
    pub current_scene: Option<String>,
    #[serde(default)]
    pub completed_episodes: Vec<String>,
    #[serde(default)]
    pub completed_scenes: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl StoryProgress {
    pub fn new(
        character_id: CharacterId,
        current_episode: Option<String>,
        current_scene: Option<String>,
    ) -> Self {
        Self {
            character_id,
            current_episode,
            current_scene,
            completed_episodes: Vec::new(),
            completed_scenes: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Marks `completed_scene` done and moves to `next_scene`.
    pub fn advance(&mut self, completed_scene: &str, next_scene: Option<&str>) {
        if !self.completed_scenes.iter().any(|s| s == completed_scene) {
            self.completed_scenes.push(completed_scene.to_string());
        }
        self.current_scene = next_scene.map(str::to_string);
        self.updated_at = Utc::now();
    }

    /// Returns false if the episode was already complete.
    pub fn complete_episode(&mut self, episode_id: &str) -> bool {
        if self.completed_episodes.iter().any(|e| e == episode_id) {
            return false;
        }
        self.completed_episodes.push(episode_id.to_string());
        self.current_episode = None;
        self.current_scene = None;
        self.updated_at = Utc::now();
        true
    }

    pub fn is_scene_completed(&self, scene_id: &str) -> bool {
        self.completed_scenes.iter().any(|s| s == scene_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatKind;

    const TWO_SCENES: &str = r#"
archetype: kuudere
episodes:
  - id: ep1
    title: Test
    scenes:
      - id: a
        text: first
        choices:
          - id: go
            text: go on
            delta: { trust: 2 }
            next: b
          - id: stop
            text: stop
            delta: { affection: -1 }
          - id: broken
            text: nowhere
            next: b
      - id: b
        text: second
"#;

    fn engine() -> StoryEngine {
        StoryEngine::from_yaml_sources([TWO_SCENES]).unwrap()
    }

    #[test]
    fn builtin_content_validates() {
        let engine = StoryEngine::builtin().unwrap();
        for id in CharacterId::ALL {
            assert!(engine.initial_scene(id).is_ok(), "{id} has no story");
        }
    }

    #[test]
    fn alisa_opens_at_the_cafe_with_one_locked_choice() {
        let engine = StoryEngine::builtin().unwrap();
        let scene = engine.initial_scene(CharacterId::Alisa).unwrap();
        assert_eq!(scene.choices.len(), 3);

        let gated: Vec<_> = scene
            .choices
            .iter()
            .filter(|c| c.requires.chemistry == Some(15))
            .collect();
        assert_eq!(gated.len(), 1);

        let stats = RelationshipStats::initial();
        assert_eq!(stats.chemistry, 10);
        let views = engine.available_choices(scene, &stats);
        let locked: Vec<_> = views.iter().filter(|v| v.locked).collect();
        assert_eq!(locked.len(), 1);
        assert_eq!(locked[0].choice.id, gated[0].id);
    }

    #[test]
    fn maria_story_contains_trust_check() {
        let engine = StoryEngine::builtin().unwrap();
        let check = engine
            .episodes(CharacterId::Maria)
            .iter()
            .flat_map(|e| e.scenes.iter())
            .find_map(|s| s.skill_check.as_ref())
            .expect("maria has a skill check");
        assert_eq!(check.stat, StatKind::Trust);
    }

    #[test]
    fn advance_to_resolvable_scene() {
        let engine = engine();
        let start = engine.initial_scene(CharacterId::Alisa).unwrap();
        let step = engine.advance(CharacterId::Alisa, start, "go");
        assert!(!step.episode_ended);
        assert_eq!(step.next_scene.map(|s| s.id.as_str()), Some("b"));
        assert_eq!(step.stat_delta.and_then(|d| d.trust), Some(2.0));
    }

    #[test]
    fn unknown_choice_ends_without_delta() {
        let engine = engine();
        let start = engine.initial_scene(CharacterId::Alisa).unwrap();
        let step = engine.advance(CharacterId::Alisa, start, "missing");
        assert!(step.episode_ended);
        assert!(step.next_scene.is_none());
        assert!(step.stat_delta.is_none());
    }

    #[test]
    fn terminal_choice_still_returns_delta() {
        let engine = engine();
        let start = engine.initial_scene(CharacterId::Alisa).unwrap();
        let step = engine.advance(CharacterId::Alisa, start, "stop");
        assert!(step.episode_ended);
        assert!(step.next_scene.is_none());
        assert_eq!(step.stat_delta.and_then(|d| d.affection), Some(-1.0));
    }

    #[test]
    fn dangling_target_on_foreign_scene_degrades_to_end() {
        // A scene from another archetype can point at ids this one lacks.
        let engine = engine();
        let foreign: Scene = serde_yaml::from_str(
            "id: x\ntext: t\nchoices:\n  - id: jump\n    text: j\n    next: nowhere\n",
        )
        .unwrap();
        let step = engine.advance(CharacterId::Alisa, &foreign, "jump");
        assert!(step.episode_ended);
        assert!(step.next_scene.is_none());
        assert!(step.stat_delta.is_some());
    }

    #[test]
    fn advance_is_deterministic() {
        let engine = engine();
        let start = engine.initial_scene(CharacterId::Alisa).unwrap();
        let first = engine.advance(CharacterId::Alisa, start, "go");
        let second = engine.advance(CharacterId::Alisa, start, "go");
        assert_eq!(first, second);
    }

    #[test]
    fn character_without_content_reports_empty_story() {
        let engine = engine();
        let err = engine.initial_scene(CharacterId::Maria).unwrap_err();
        assert!(matches!(err, StoryError::EmptyStory(CharacterId::Maria)));
        assert!(engine.scene_by_id(CharacterId::Maria, "a").is_none());
    }

    #[test]
    fn rejects_dangling_reference_at_load() {
        let broken = TWO_SCENES.replace("next: b\n          - id: stop", "next: zzz\n          - id: stop");
        let err = StoryEngine::from_yaml_sources([broken.as_str()]).unwrap_err();
        assert!(matches!(err, StoryError::DanglingReference { ref target, .. } if target == "zzz"));
    }

    #[test]
    fn rejects_duplicate_scene_ids() {
        let dup = TWO_SCENES.replace("- id: b\n", "- id: a\n");
        let err = StoryEngine::from_yaml_sources([dup.as_str()]).unwrap_err();
        assert!(matches!(err, StoryError::DuplicateScene { .. }));
    }

    #[test]
    fn rejects_empty_episode() {
        let yaml = "archetype: tomboy\nepisodes:\n  - id: e\n    title: t\n    scenes: []\n";
        let err = StoryEngine::from_yaml_sources([yaml]).unwrap_err();
        assert!(matches!(err, StoryError::EmptyEpisode { .. }));
    }

    #[test]
    fn progress_dedupes_completed_scenes() {
        let engine = engine();
        let mut progress = engine.start_progress(CharacterId::Alisa);
        assert_eq!(progress.current_scene.as_deref(), Some("a"));

        progress.advance("a", Some("b"));
        progress.advance("a", Some("b"));
        assert_eq!(progress.completed_scenes, vec!["a".to_string()]);
        assert_eq!(progress.current_scene.as_deref(), Some("b"));

        assert!(progress.complete_episode("ep1"));
        assert!(!progress.complete_episode("ep1"));
        assert!(progress.current_scene.is_none());
    }

    #[test]
    fn scene_ids_cover_every_episode() {
        let engine = StoryEngine::builtin().unwrap();
        let ids = engine.scene_ids(CharacterId::Katya);
        assert!(!ids.is_empty());
        assert_eq!(ids, engine.scene_ids(CharacterId::Lera));
    }
}
