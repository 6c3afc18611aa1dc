//! Score aggregation, lives and challenge flags
//!
//! Every expected slot ends up here exactly once: as a judged hit through
//! [`ScoreSession::record_hit`] or as a miss through [`ScoreSession::missed`]
//! (out-of-window press, forfeit, timeout or retirement flush).

use serde::{Deserialize, Serialize};

use super::judge::{AccuracyClass, InputResult};
use super::rod::Rod;
use super::state::GameEvent;
use crate::audio::SoundEffect;
use crate::beats_equal;
use crate::consts::*;
use crate::input::InputType;
use crate::settings::SessionMode;

/// Points per accuracy class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub ace: u64,
    pub good: u64,
    pub barely: u64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            ace: 100,
            good: 80,
            barely: 50,
        }
    }
}

impl ScoreWeights {
    pub fn points_for(&self, class: AccuracyClass) -> u64 {
        match class {
            AccuracyClass::Ace => self.ace,
            AccuracyClass::Good => self.good,
            AccuracyClass::Barely => self.barely,
            AccuracyClass::Miss => 0,
        }
    }
}

/// "Going for perfect" state. Fails at most once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PerfectChallenge {
    #[default]
    Off,
    Active,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassCounts {
    pub ace: u32,
    pub good: u32,
    pub barely: u32,
    pub miss: u32,
}

impl ClassCounts {
    pub fn hits(&self) -> u32 {
        self.ace + self.good + self.barely
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredInput {
    pub beat: f64,
    pub input_type: InputType,
    pub was_hit: bool,
}

/// What a hit did to the practice tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeProgress {
    Unchanged,
    Progress,
    Cleared { remaining: u32 },
    Complete,
}

/// Practice pass: a fixed set of inputs must all be hit, `clears_required` times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeTracker {
    pub required: Vec<RequiredInput>,
    pub clears_required: u32,
    pub clears_remaining: u32,
}

impl PracticeTracker {
    pub fn new(required: impl IntoIterator<Item = (f64, InputType)>, clears: u32) -> Self {
        Self {
            required: required
                .into_iter()
                .map(|(beat, input_type)| RequiredInput {
                    beat,
                    input_type,
                    was_hit: false,
                })
                .collect(),
            clears_required: clears,
            clears_remaining: clears,
        }
    }

    /// True while the song is still gated on practice
    pub fn restricted(&self) -> bool {
        self.clears_remaining > 0
    }

    pub fn check(&mut self, result: &InputResult) -> PracticeProgress {
        if !self.restricted() || !result.accuracy_class.is_hit() {
            return PracticeProgress::Unchanged;
        }
        let Some(entry) = self.required.iter_mut().find(|r| {
            !r.was_hit
                && r.input_type == result.input_type
                && beats_equal(r.beat, result.perfect_beat)
        }) else {
            return PracticeProgress::Unchanged;
        };
        entry.was_hit = true;

        if !self.required.iter().all(|r| r.was_hit) {
            return PracticeProgress::Progress;
        }
        self.clears_remaining -= 1;
        for r in &mut self.required {
            r.was_hit = false;
        }
        if self.clears_remaining == 0 {
            PracticeProgress::Complete
        } else {
            PracticeProgress::Cleared {
                remaining: self.clears_remaining,
            }
        }
    }

    pub fn reset(&mut self) {
        self.clears_remaining = self.clears_required;
        for r in &mut self.required {
            r.was_hit = false;
        }
    }
}

/// Per-run score state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSession {
    pub mode: SessionMode,
    pub weights: ScoreWeights,
    pub score: u64,
    pub counts: ClassCounts,
    /// Expected slots that were never judged
    pub implicit_misses: u32,
    /// Rods that expired without a single hit
    pub explosions: u32,
    pub total_expected: u32,
    pub no_miss_so_far: bool,
    pub perfect_challenge: PerfectChallenge,
    pub lives: i32,
    pub max_lives: i32,
    pub game_over: bool,
    pub skill_bonus_beat: Option<f64>,
    pub skill_bonus_granted: bool,
    pub practice: Option<PracticeTracker>,
    going_for_perfect: bool,
    hits_toward_regen: u32,
}

impl ScoreSession {
    pub fn new(
        mode: SessionMode,
        max_lives: i32,
        going_for_perfect: bool,
        weights: ScoreWeights,
    ) -> Self {
        let max_lives = max_lives.max(0);
        Self {
            mode,
            weights,
            score: 0,
            counts: ClassCounts::default(),
            implicit_misses: 0,
            explosions: 0,
            total_expected: 0,
            no_miss_so_far: true,
            perfect_challenge: if going_for_perfect {
                PerfectChallenge::Active
            } else {
                PerfectChallenge::Off
            },
            lives: max_lives,
            max_lives,
            game_over: false,
            skill_bonus_beat: None,
            skill_bonus_granted: false,
            practice: None,
            going_for_perfect,
            hits_toward_regen: 0,
        }
    }

    pub fn with_skill_bonus(mut self, beat: Option<f64>) -> Self {
        self.skill_bonus_beat = beat;
        self
    }

    pub fn with_practice(mut self, practice: Option<PracticeTracker>) -> Self {
        self.practice = practice;
        self
    }

    #[inline]
    pub fn uses_lives(&self) -> bool {
        self.mode.uses_lives() && self.max_lives > 0
    }

    /// Add `count` expected slots (called on rod deployment)
    pub fn register_expected(&mut self, count: usize) {
        self.total_expected += count as u32;
    }

    /// Count one miss. Breaks the no-miss streak, fails the perfect
    /// challenge once and, in life modes, costs a life.
    pub fn missed(&mut self, events: &mut Vec<GameEvent>) {
        self.counts.miss += 1;
        self.no_miss_so_far = false;

        if self.perfect_challenge == PerfectChallenge::Active {
            self.perfect_challenge = PerfectChallenge::Failed;
            log::info!("Perfect run failed");
            events.push(GameEvent::PerfectFailed);
            events.push(GameEvent::PlaySound(SoundEffect::PerfectFail));
        }

        if !self.uses_lives() || self.lives <= 0 {
            return;
        }
        self.lives = (self.lives - 1).clamp(0, self.max_lives);
        self.hits_toward_regen = 0;
        events.push(GameEvent::LifeLost {
            remaining: self.lives,
        });

        if self.lives == 0 && !self.game_over {
            self.game_over = true;
            log::info!("Out of lives: game over");
            events.push(GameEvent::GameOver);
            events.push(GameEvent::PlaySound(SoundEffect::GameOver));
        }
    }

    /// Count a judged hit
    pub fn record_hit(&mut self, result: &InputResult, events: &mut Vec<GameEvent>) {
        let class = result.accuracy_class;
        let level_before = self.endless_level();
        match class {
            AccuracyClass::Ace => self.counts.ace += 1,
            AccuracyClass::Good => self.counts.good += 1,
            AccuracyClass::Barely => self.counts.barely += 1,
            AccuracyClass::Miss => return,
        }
        // Practice hits earn nothing until the required inputs are cleared
        if !self.practice_restricted() {
            self.score += self.weights.points_for(class);
        }

        let level = self.endless_level();
        if self.mode == SessionMode::Endless && level > level_before {
            log::info!("Endless level {}", level);
            events.push(GameEvent::LevelUp { level });
        }

        if let Some(practice) = self.practice.as_mut() {
            match practice.check(result) {
                PracticeProgress::Cleared { remaining } => {
                    events.push(GameEvent::PracticeCleared { remaining });
                    events.push(GameEvent::PlaySound(SoundEffect::PracticeClear));
                }
                PracticeProgress::Complete => {
                    log::info!("Practice complete");
                    events.push(GameEvent::PracticeComplete);
                    events.push(GameEvent::PlaySound(SoundEffect::PracticeClear));
                }
                PracticeProgress::Unchanged | PracticeProgress::Progress => {}
            }
        }

        if self.uses_lives() && !self.game_over {
            self.hits_toward_regen += 1;
            if self.hits_toward_regen >= LIFE_REGEN_INTERVAL {
                self.hits_toward_regen = 0;
                if self.lives > 0 && self.lives < self.max_lives {
                    self.lives += 1;
                    events.push(GameEvent::LifeRestored {
                        remaining: self.lives,
                    });
                }
            }
        }
    }

    /// True while a practice tracker still has clears outstanding
    pub fn practice_restricted(&self) -> bool {
        self.practice.as_ref().is_some_and(|p| p.restricted())
    }

    /// Grant the one-time skill bonus for an Ace at the designated beat
    pub fn try_skill_bonus(&mut self, perfect_beat: f64, events: &mut Vec<GameEvent>) -> bool {
        let Some(beat) = self.skill_bonus_beat else {
            return false;
        };
        if self.skill_bonus_granted || !beats_equal(beat, perfect_beat) {
            return false;
        }
        self.skill_bonus_granted = true;
        log::info!("Skill bonus at beat {}", beat);
        events.push(GameEvent::SkillBonus { beat });
        events.push(GameEvent::PlaySound(SoundEffect::SkillBonus));
        true
    }

    /// A rod expired without a single hit: one miss for the rod itself
    pub fn rod_exploded(&mut self, rod: &Rod, events: &mut Vec<GameEvent>) {
        self.explosions += 1;
        log::debug!("rod {} exploded on lane {}", rod.id, rod.lane);
        events.push(GameEvent::RodExploded {
            rod_id: rod.id,
            lane: rod.lane,
        });
        events.push(GameEvent::PlaySound(SoundEffect::Explode));
        self.missed(events);
    }

    /// Reconcile a retiring rod: every expected slot with no recorded result
    /// is an implicit miss. Returns those indices.
    pub fn submit_rod_results(
        &mut self,
        rod: &Rod,
        results: &[InputResult],
        events: &mut Vec<GameEvent>,
    ) -> Vec<usize> {
        let unjudged: Vec<usize> = rod
            .pending_indices()
            .filter(|&i| !results.iter().any(|r| r.rod_id == rod.id && r.judged_index == i))
            .collect();

        for _ in &unjudged {
            self.implicit_misses += 1;
            self.missed(events);
        }
        if !unjudged.is_empty() {
            log::debug!("rod {} retired with {} unjudged blocks", rod.id, unjudged.len());
        }
        unjudged
    }

    /// Score as a fraction of a perfect run over the slots expected so far
    pub fn score_percent(&self) -> f64 {
        if self.total_expected == 0 {
            return 0.0;
        }
        self.score as f64 / (self.total_expected as f64 * self.weights.ace as f64)
    }

    /// Difficulty tier for endless mode
    pub fn endless_level(&self) -> u32 {
        self.counts.hits() / ENDLESS_LEVEL_STEP
    }

    /// Fraction of the configured timing window in force. Endless mode
    /// narrows it by `ENDLESS_WINDOW_STEP` per level.
    pub fn window_scale(&self) -> f64 {
        if self.mode != SessionMode::Endless {
            return 1.0;
        }
        let narrowed = 1.0 - ENDLESS_WINDOW_STEP * self.endless_level() as f64;
        narrowed.max(ENDLESS_MIN_WINDOW_SCALE)
    }

    pub fn is_perfect_run(&self) -> bool {
        self.no_miss_so_far && self.counts.hits() == self.total_expected
    }

    /// Every expected slot counted once, plus one miss per exploded rod
    pub fn is_reconciled(&self) -> bool {
        self.counts.hits() + self.counts.miss == self.total_expected + self.explosions
    }

    /// Start a fresh run with the same configuration
    pub fn reset(&mut self) {
        let practice = self.practice.take().map(|mut p| {
            p.reset();
            p
        });
        *self = Self::new(self.mode, self.max_lives, self.going_for_perfect, self.weights)
            .with_skill_bonus(self.skill_bonus_beat)
            .with_practice(practice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::lane::{Lane, Target};
    use crate::sim::rod::{ExpectedState, RodKind};

    fn hit(rod_id: u32, index: usize, beat: f64, class: AccuracyClass) -> InputResult {
        InputResult {
            rod_id,
            lane: 0,
            perfect_beat: beat,
            input_type: InputType::A,
            accuracy_percent: 0.0,
            accuracy_sec: 0.0,
            judged_index: index,
            accuracy_class: class,
        }
    }

    fn new_session(mode: SessionMode, lives: i32, going_for_perfect: bool) -> ScoreSession {
        ScoreSession::new(mode, lives, going_for_perfect, ScoreWeights::default())
    }

    fn endless(lives: i32) -> ScoreSession {
        new_session(SessionMode::Endless, lives, false)
    }

    #[test]
    fn test_lives_floor_at_zero_and_game_over_fires_once() {
        let mut session = endless(1);
        let mut events = Vec::new();
        session.missed(&mut events);
        session.missed(&mut events);

        assert_eq!(session.lives, 0);
        assert!(session.game_over);
        let overs = events.iter().filter(|e| **e == GameEvent::GameOver).count();
        assert_eq!(overs, 1);
    }

    #[test]
    fn test_standard_mode_has_no_lives() {
        let mut session = new_session(SessionMode::Standard, 3, false);
        let mut events = Vec::new();
        session.missed(&mut events);
        assert_eq!(session.lives, 3);
        assert!(!session.game_over);
        assert!(!session.no_miss_so_far);
    }

    #[test]
    fn test_perfect_challenge_fails_once() {
        let mut session = new_session(SessionMode::Standard, 0, true);
        let mut events = Vec::new();
        session.missed(&mut events);
        session.missed(&mut events);
        assert_eq!(session.perfect_challenge, PerfectChallenge::Failed);
        let fails = events.iter().filter(|e| **e == GameEvent::PerfectFailed).count();
        assert_eq!(fails, 1);
    }

    #[test]
    fn test_regen_restores_life_but_not_from_zero() {
        let mut session = endless(3);
        let mut events = Vec::new();
        session.missed(&mut events);
        assert_eq!(session.lives, 2);

        for i in 0..LIFE_REGEN_INTERVAL {
            session.record_hit(&hit(1, i as usize, i as f64, AccuracyClass::Good), &mut events);
        }
        assert_eq!(session.lives, 3);

        let mut dead = endless(1);
        dead.missed(&mut events);
        for i in 0..LIFE_REGEN_INTERVAL {
            dead.record_hit(&hit(1, i as usize, i as f64, AccuracyClass::Ace), &mut events);
        }
        assert_eq!(dead.lives, 0);
    }

    #[test]
    fn test_submit_flushes_unjudged_blocks_as_misses() {
        let targets = (0..3).map(|i| Target::new(1.0 + i as f64, InputType::A)).collect();
        let lane = Lane::new(0, InputType::A, targets);
        let mut rod = Rod::deploy(7, &lane, 0.0, 0, 1.0, RodKind::Standard);
        let mut session = new_session(SessionMode::Standard, 0, false);
        session.register_expected(rod.expected_count());

        let results = vec![hit(7, 1, 2.0, AccuracyClass::Ace)];
        rod.resolve(1, ExpectedState::Hit);
        let mut events = Vec::new();
        session.record_hit(&results[0], &mut events);

        let flushed = session.submit_rod_results(&rod, &results, &mut events);
        assert_eq!(flushed, vec![0, 2]);
        assert_eq!(session.implicit_misses, 2);
        assert_eq!(session.counts.miss, 2);
        assert!(session.is_reconciled());
        assert!((session.score_percent() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_skill_bonus_granted_once_at_its_beat() {
        let mut session = new_session(SessionMode::Standard, 0, false)
            .with_skill_bonus(Some(4.0));
        let mut events = Vec::new();
        assert!(!session.try_skill_bonus(3.0, &mut events));
        assert!(session.try_skill_bonus(4.0, &mut events));
        assert!(!session.try_skill_bonus(4.0, &mut events));
        assert!(session.skill_bonus_granted);
    }

    #[test]
    fn test_practice_clears_then_completes() {
        let practice = PracticeTracker::new([(2.0, InputType::A), (3.0, InputType::A)], 2);
        let mut session = new_session(SessionMode::Practice, 0, false)
            .with_practice(Some(practice));
        let mut events = Vec::new();

        session.record_hit(&hit(1, 0, 2.0, AccuracyClass::Good), &mut events);
        session.record_hit(&hit(1, 1, 3.0, AccuracyClass::Barely), &mut events);
        assert!(events.contains(&GameEvent::PracticeCleared { remaining: 1 }));

        session.record_hit(&hit(2, 0, 2.0, AccuracyClass::Ace), &mut events);
        session.record_hit(&hit(2, 1, 3.0, AccuracyClass::Ace), &mut events);
        assert!(events.contains(&GameEvent::PracticeComplete));
        assert!(session.practice.as_ref().is_some_and(|p| !p.restricted()));
        // Nothing scored while the practice inputs were outstanding
        assert_eq!(session.score, 0);
        assert!(!session.practice_restricted());

        session.record_hit(&hit(3, 0, 5.0, AccuracyClass::Ace), &mut events);
        assert_eq!(session.score, 100);
    }

    #[test]
    fn test_reset_restores_configuration() {
        let mut session = endless(2).with_skill_bonus(Some(1.0));
        let mut events = Vec::new();
        session.missed(&mut events);
        session.register_expected(4);
        session.reset();
        assert_eq!(session.lives, 2);
        assert_eq!(session.total_expected, 0);
        assert!(session.no_miss_so_far);
        assert_eq!(session.skill_bonus_beat, Some(1.0));
    }

    #[test]
    fn test_endless_level_rises_with_hits() {
        let mut session = endless(3);
        let mut events = Vec::new();
        for i in 0..ENDLESS_LEVEL_STEP * 2 {
            session.record_hit(&hit(1, 0, i as f64, AccuracyClass::Ace), &mut events);
        }
        assert_eq!(session.endless_level(), 2);
        assert!((session.window_scale() - (1.0 - 2.0 * ENDLESS_WINDOW_STEP)).abs() < 1e-12);
        let level_ups = events
            .iter()
            .filter(|e| matches!(e, GameEvent::LevelUp { .. }))
            .count();
        assert_eq!(level_ups, 2);

        for i in 0..ENDLESS_LEVEL_STEP * 20 {
            session.record_hit(&hit(1, 0, i as f64, AccuracyClass::Ace), &mut events);
        }
        assert_eq!(session.window_scale(), ENDLESS_MIN_WINDOW_SCALE);
    }

    #[test]
    fn test_window_only_narrows_in_endless() {
        let mut session = new_session(SessionMode::Standard, 0, false);
        let mut events = Vec::new();
        for i in 0..ENDLESS_LEVEL_STEP * 3 {
            session.record_hit(&hit(1, 0, i as f64, AccuracyClass::Ace), &mut events);
        }
        assert_eq!(session.endless_level(), 3);
        assert_eq!(session.window_scale(), 1.0);
        assert!(!events.iter().any(|e| matches!(e, GameEvent::LevelUp { .. })));
    }
}
