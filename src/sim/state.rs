//! Game state and core simulation types
//!
//! Everything the tick needs lives here: the song clock, lanes, live rods,
//! the judged results and the score session.

use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::judge::{AccuracyClass, AccuracyTable, InputResult};
use super::lane::Lane;
use super::rod::Rod;
use super::score::{PracticeTracker, ScoreSession};
use super::tempo::TempoMap;
use crate::audio::SoundEffect;
use crate::error::Result;
use crate::schedule::{RodDeployment, Schedule};
use crate::settings::{SessionMode, Settings};

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Song running
    Playing,
    /// Clock frozen
    Paused,
    /// Out of lives
    GameOver,
    /// Every rod retired and every lane exhausted
    Finished,
}

/// Fire-and-forget notifications for the audio/UI side
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    PlaySound(SoundEffect),
    /// Feedback indicator for a lane
    Flash { lane: usize, class: AccuracyClass },
    SkillBonus { beat: f64 },
    PerfectFailed,
    LifeLost { remaining: i32 },
    LifeRestored { remaining: i32 },
    GameOver,
    PracticeCleared { remaining: u32 },
    PracticeComplete,
    RodExploded { rod_id: u32, lane: usize },
    /// Endless difficulty went up; the timing window narrows
    LevelUp { level: u32 },
    RoundComplete,
}

/// Complete game state (deterministic for a given schedule, settings and seed)
#[derive(Debug, Clone)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub(crate) rng: Pcg32,
    pub phase: GamePhase,
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Song time driving every beat lookup
    pub song_seconds: f64,
    pub tempo: TempoMap,
    /// Lanes ordered by id
    pub lanes: Vec<Lane>,
    /// Live rods (sorted by id for determinism)
    pub rods: Vec<Rod>,
    /// Every judged press this run
    pub results: Vec<InputResult>,
    pub session: ScoreSession,
    pub accuracy: AccuracyTable,
    /// Calibration added to every press timestamp
    pub input_offset_sec: f64,
    /// Deployments sorted by beat
    deployments: Vec<RodDeployment>,
    next_deployment: usize,
    /// Lanes as loaded, for restarts
    initial_lanes: Vec<Lane>,
    pub(crate) events: Vec<GameEvent>,
    next_id: u32,
}

impl GameState {
    /// Build a round from a schedule. Fails only on bad configuration.
    pub fn new(schedule: &Schedule, settings: &Settings) -> Result<Self> {
        let tempo = schedule.tempo_map()?;
        settings.accuracy.validate()?;

        let lanes = schedule.build_lanes();
        schedule.validate(&lanes, &tempo, settings.accuracy.max_offset_sec)?;
        if lanes.is_empty() {
            log::warn!("Schedule has no targets; nothing to judge this round");
        }

        let mut deployments = schedule.rods.clone();
        deployments.sort_by(|a, b| a.beat.total_cmp(&b.beat));

        let practice = (settings.mode == SessionMode::Practice && !schedule.practice.is_empty())
            .then(|| {
                PracticeTracker::new(
                    schedule.practice.iter().map(|p| (p.beat, p.input)),
                    schedule.practice_clears.max(1),
                )
            });
        let session = ScoreSession::new(
            settings.mode,
            settings.max_lives,
            settings.going_for_perfect,
            settings.weights,
        )
        .with_skill_bonus(schedule.skill_bonus_beat)
        .with_practice(practice);

        log::info!(
            "Round ready: {} lanes, {} rods, mode {}, seed {}",
            lanes.len(),
            deployments.len(),
            settings.mode.as_str(),
            settings.seed
        );

        Ok(Self {
            seed: settings.seed,
            rng: Pcg32::seed_from_u64(settings.seed),
            phase: GamePhase::Playing,
            time_ticks: 0,
            song_seconds: 0.0,
            tempo,
            initial_lanes: lanes.clone(),
            lanes,
            rods: Vec::new(),
            results: Vec::new(),
            session,
            accuracy: settings.accuracy,
            input_offset_sec: settings.input_offset_sec,
            deployments,
            next_deployment: 0,
            events: Vec::new(),
            next_id: 1,
        })
    }

    /// Start the same round again from the top
    pub fn restart(&mut self) {
        self.rng = Pcg32::seed_from_u64(self.seed);
        self.phase = GamePhase::Playing;
        self.time_ticks = 0;
        self.song_seconds = 0.0;
        self.lanes = self.initial_lanes.clone();
        self.rods.clear();
        self.results.clear();
        self.session.reset();
        self.next_deployment = 0;
        self.events.clear();
        self.next_id = 1;
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    #[inline]
    pub fn now_beat(&self) -> f64 {
        self.tempo.seconds_to_beats(self.song_seconds)
    }

    /// Snap the song clock to an external audio clock. The clock never runs
    /// backwards; an earlier reading is ignored.
    pub fn sync_clock(&mut self, audio_seconds: f64) {
        if audio_seconds.is_finite() && audio_seconds > self.song_seconds {
            self.song_seconds = audio_seconds;
        }
    }

    /// Take every event queued since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Accuracy table in force right now (narrowed by endless level)
    pub fn effective_accuracy(&self) -> AccuracyTable {
        AccuracyTable {
            max_offset_sec: self.accuracy.max_offset_sec * self.session.window_scale(),
            ..self.accuracy
        }
    }

    /// Practice hits are unscored and the run is kept off the high-score
    /// table until the practice inputs have been cleared
    pub fn practice_restricted(&self) -> bool {
        self.session.practice_restricted()
    }

    pub fn lane_slot(&self, lane_id: usize) -> Option<usize> {
        self.lanes.iter().position(|l| l.id == lane_id)
    }

    /// Spawn every rod whose deployment beat has been reached
    pub fn deploy_due(&mut self, now_beat: f64) {
        while let Some(deployment) = self.deployments.get(self.next_deployment) {
            if deployment.beat > now_beat {
                break;
            }
            let deployment = deployment.clone();
            self.next_deployment += 1;

            let Some(slot) = self.lane_slot(deployment.lane) else {
                continue;
            };
            let id = self.next_entity_id();
            let rod = Rod::deploy(
                id,
                &self.lanes[slot],
                deployment.beat,
                deployment.origin_block,
                deployment.x_units_per_beat,
                deployment.kind,
            );
            self.session.register_expected(rod.expected_count());
            log::debug!(
                "rod {} ({}) deployed on lane {} at beat {:.2}, expecting {}",
                id,
                rod.kind.as_str(),
                rod.lane,
                deployment.beat,
                rod.expected_count()
            );
            self.rods.push(rod);
        }
    }

    /// True once nothing is left to spawn, judge or retire
    pub fn is_round_complete(&self) -> bool {
        self.next_deployment >= self.deployments.len()
            && self.rods.is_empty()
            && self.lanes.iter().all(|l| l.is_exhausted())
    }

    /// Run empty ticks until the song reaches `beat`
    #[cfg(test)]
    pub(crate) fn advance_to_beat(&mut self, beat: f64) {
        let input = super::tick::TickInput::default();
        while self.now_beat() < beat && self.phase == GamePhase::Playing {
            super::tick::tick(self, &input, crate::consts::SIM_DT);
        }
    }
}
