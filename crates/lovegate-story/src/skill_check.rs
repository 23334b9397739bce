//! Stat-gated d20 checks.
//!
//! A check rolls 1–20, adds `stat / 10` and compares the total against the
//! difficulty threshold. A natural 20 always succeeds and a natural 1 always
//! fails, so no check is ever fully decided by the stat alone.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::stats::{RelationshipStats, StatDelta, StatKind};

pub const DIE_FACES: u8 = 20;
const CRITICAL_SUCCESS: u8 = DIE_FACES;
const CRITICAL_FAILURE: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Trivial,
    Easy,
    Medium,
    Hard,
    Legendary,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::Trivial,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Legendary,
    ];

    pub fn threshold(&self) -> u8 {
        match self {
            Difficulty::Trivial => 5,
            Difficulty::Easy => 10,
            Difficulty::Medium => 15,
            Difficulty::Hard => 20,
            Difficulty::Legendary => 25,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Trivial => "Тривиально",
            Difficulty::Easy => "Легко",
            Difficulty::Medium => "Средне",
            Difficulty::Hard => "Сложно",
            Difficulty::Legendary => "Легендарно",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A check authored on a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCheck {
    pub id: String,
    pub stat: StatKind,
    pub difficulty: Difficulty,
    pub description: String,
    pub success_text: String,
    pub failure_text: String,
    #[serde(default)]
    pub success_delta: StatDelta,
    #[serde(default)]
    pub failure_delta: StatDelta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCheckResult {
    pub success: bool,
    pub roll: u8,
    pub modifier: u8,
    pub total: u8,
    pub threshold: u8,
    pub critical_success: bool,
    pub critical_failure: bool,
    /// `total - threshold`; negative on a miss.
    pub margin: i16,
}

impl SkillCheckResult {
    /// One-line summary, e.g. `🎲 14 + 3 = 17 vs 15 — ✅ Успех!`.
    pub fn summary(&self) -> String {
        let status = if self.critical_success {
            "🎯 Критический успех!"
        } else if self.critical_failure {
            "💥 Критический провал!"
        } else if self.success {
            "✅ Успех!"
        } else {
            "❌ Провал"
        };
        format!(
            "🎲 {} + {} = {} vs {} — {}",
            self.roll, self.modifier, self.total, self.threshold, status
        )
    }
}

/// Evaluates a check against a known roll. Out-of-range rolls are clamped to the die.
pub fn check_with_roll(stat_value: u8, difficulty: Difficulty, roll: u8) -> SkillCheckResult {
    let roll = roll.clamp(1, DIE_FACES);
    let modifier = stat_value.min(100) / 10;
    let total = roll + modifier;
    let threshold = difficulty.threshold();
    let critical_success = roll == CRITICAL_SUCCESS;
    let critical_failure = roll == CRITICAL_FAILURE;

    SkillCheckResult {
        success: critical_success || (!critical_failure && total >= threshold),
        roll,
        modifier,
        total,
        threshold,
        critical_success,
        critical_failure,
        margin: i16::from(total) - i16::from(threshold),
    }
}

pub fn check<R: Rng + ?Sized>(stat_value: u8, difficulty: Difficulty, rng: &mut R) -> SkillCheckResult {
    let roll = rng.gen_range(1..=DIE_FACES);
    check_with_roll(stat_value, difficulty, roll)
}

/// Percentage of die faces that succeed, kept within 5..=95.
pub fn success_chance(stat_value: u8, difficulty: Difficulty) -> u8 {
    let winning = (1..=DIE_FACES)
        .filter(|roll| check_with_roll(stat_value, difficulty, *roll).success)
        .count();
    let percent = (winning as f64 * 100.0 / f64::from(DIE_FACES)).round() as u8;
    percent.clamp(5, 95)
}

pub fn describe_chance(percent: u8) -> &'static str {
    match percent {
        90.. => "Почти наверняка",
        70..=89 => "Хороший шанс",
        50..=69 => "Равные шансы",
        30..=49 => "Рискованно",
        10..=29 => "Маловероятно",
        _ => "Почти невозможно",
    }
}

/// Result of resolving an authored check: the roll, the narration to show and
/// the delta the caller should apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCheckOutcome {
    pub check_id: String,
    pub result: SkillCheckResult,
    pub text: String,
    pub stat_delta: StatDelta,
}

impl SkillCheck {
    pub fn chance(&self, stats: &RelationshipStats) -> u8 {
        success_chance(stats.get(self.stat), self.difficulty)
    }

    pub fn resolve<R: Rng + ?Sized>(&self, stats: &RelationshipStats, rng: &mut R) -> SkillCheckOutcome {
        let result = check(stats.get(self.stat), self.difficulty, rng);
        self.outcome(result)
    }

    pub fn resolve_with_roll(&self, stats: &RelationshipStats, roll: u8) -> SkillCheckOutcome {
        self.outcome(check_with_roll(stats.get(self.stat), self.difficulty, roll))
    }

    fn outcome(&self, result: SkillCheckResult) -> SkillCheckOutcome {
        let (text, stat_delta) = if result.success {
            (&self.success_text, self.success_delta)
        } else {
            (&self.failure_text, self.failure_delta)
        };
        tracing::debug!(
            check = %self.id,
            stat = %self.stat,
            roll = result.roll,
            total = result.total,
            success = result.success,
            "skill check resolved"
        );
        SkillCheckOutcome {
            check_id: self.id.clone(),
            result,
            text: text.clone(),
            stat_delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn trust_check() -> SkillCheck {
        SkillCheck {
            id: "rooftop".into(),
            stat: StatKind::Trust,
            difficulty: Difficulty::Medium,
            description: "Довериться ей?".into(),
            success_text: "Получилось".into(),
            failure_text: "Не вышло".into(),
            success_delta: StatDelta::default().with(StatKind::Trust, 10.0),
            failure_delta: StatDelta::default().with(StatKind::Trust, -5.0),
        }
    }

    #[test]
    fn thresholds_increase_with_difficulty() {
        let thresholds: Vec<u8> = Difficulty::ALL.iter().map(|d| d.threshold()).collect();
        assert_eq!(thresholds, vec![5, 10, 15, 20, 25]);
    }

    #[test]
    fn natural_twenty_always_succeeds() {
        for stat in [0, 50, 100] {
            for difficulty in Difficulty::ALL {
                let result = check_with_roll(stat, difficulty, 20);
                assert!(result.success);
                assert!(result.critical_success);
                assert!(!result.critical_failure);
            }
        }
    }

    #[test]
    fn natural_one_always_fails() {
        for stat in [0, 50, 100] {
            for difficulty in Difficulty::ALL {
                let result = check_with_roll(stat, difficulty, 1);
                assert!(!result.success);
                assert!(result.critical_failure);
                assert!(!result.critical_success);
            }
        }
    }

    #[test]
    fn modifier_is_stat_tenths() {
        let result = check_with_roll(47, Difficulty::Medium, 11);
        assert_eq!(result.modifier, 4);
        assert_eq!(result.total, 15);
        assert_eq!(result.margin, 0);
        assert!(result.success);

        let miss = check_with_roll(9, Difficulty::Medium, 14);
        assert_eq!(miss.margin, -1);
        assert!(!miss.success);
    }

    #[test]
    fn success_chance_is_bounded_and_monotonic() {
        for difficulty in Difficulty::ALL {
            let mut previous = 0;
            for stat in 0..=100 {
                let chance = success_chance(stat, difficulty);
                assert!((5..=95).contains(&chance), "{difficulty:?} {stat} -> {chance}");
                assert!(chance >= previous);
                previous = chance;
            }
        }
    }

    #[test]
    fn legendary_without_stat_needs_a_critical() {
        assert_eq!(success_chance(0, Difficulty::Legendary), 5);
        assert_eq!(success_chance(100, Difficulty::Trivial), 95);
    }

    #[test]
    fn seeded_rolls_stay_on_the_die() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let result = check(30, Difficulty::Hard, &mut rng);
            assert!((1..=DIE_FACES).contains(&result.roll));
        }
    }

    #[test]
    fn resolve_picks_branch_text_and_delta() {
        let check = trust_check();
        let stats = RelationshipStats::initial();

        let win = check.resolve_with_roll(&stats, 20);
        assert_eq!(win.text, "Получилось");
        assert_eq!(win.stat_delta.trust, Some(10.0));

        let loss = check.resolve_with_roll(&stats, 2);
        assert_eq!(loss.text, "Не вышло");
        assert_eq!(loss.stat_delta.trust, Some(-5.0));
    }

    #[test]
    fn summary_line_reports_status() {
        assert_eq!(
            check_with_roll(35, Difficulty::Medium, 14).summary(),
            "🎲 14 + 3 = 17 vs 15 — ✅ Успех!"
        );
        assert!(check_with_roll(0, Difficulty::Easy, 1).summary().ends_with("💥 Критический провал!"));
    }

    #[test]
    fn chance_descriptions() {
        assert_eq!(describe_chance(95), "Почти наверняка");
        assert_eq!(describe_chance(50), "Равные шансы");
        assert_eq!(describe_chance(5), "Почти невозможно");
    }
}
