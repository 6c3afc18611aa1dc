//! Rod Rhythm entry point
//!
//! Headless runner: plays a schedule with an autoplay input thread, feeds the
//! fixed-timestep loop, and records the run in the high-score table.
//!
//! Usage: `rod-rhythm [schedule.json] [settings.json]`

use std::thread;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use rod_rhythm::audio::{AudioManager, SoundEffect};
use rod_rhythm::consts::*;
use rod_rhythm::highscores::{self, HighScores};
use rod_rhythm::input::{InputEvent, InputQueue, InputSender};
use rod_rhythm::sim::{GameEvent, GamePhase, GameState, TickInput, tick};
use rod_rhythm::{Schedule, Settings};

/// Simulated frame length for the headless loop
const FRAME_DT: f64 = 1.0 / 60.0;
/// Chance the autoplayer sits out a target
const AUTOPLAY_SKIP_CHANCE: f64 = 0.05;
/// Widest autoplay timing error (seconds)
const AUTOPLAY_SPREAD_SEC: f64 = 0.045;

/// Game instance holding all state
struct Game {
    state: GameState,
    queue: InputQueue,
    audio: AudioManager,
    accumulator: f64,
    pause_requested: bool,
}

impl Game {
    fn new(state: GameState, settings: &Settings) -> Self {
        let mut audio = AudioManager::default();
        audio.set_master_volume(settings.master_volume);
        audio.set_sfx_volume(settings.sfx_volume);
        audio.set_muted(settings.muted);
        Self {
            state,
            queue: InputQueue::new(),
            audio,
            accumulator: 0.0,
            pause_requested: false,
        }
    }

    /// Run simulation ticks
    fn update(&mut self, dt: f64) {
        let dt = dt.min(0.1);
        self.accumulator += dt;

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            let input = TickInput {
                presses: self.queue.drain_until(self.state.song_seconds + SIM_DT),
                pause: self.pause_requested,
            };
            tick(&mut self.state, &input, SIM_DT);
            self.accumulator -= SIM_DT;
            substeps += 1;

            // Clear one-shot inputs after processing
            self.pause_requested = false;

            let events = self.state.drain_events();
            self.audio.dispatch(&events);
            for event in &events {
                report(event);
            }
        }
    }
}

fn report(event: &GameEvent) {
    match event {
        GameEvent::PlaySound(_) | GameEvent::Flash { .. } => {}
        GameEvent::SkillBonus { beat } => log::info!("Skill bonus at beat {beat}"),
        GameEvent::LifeLost { remaining } => log::info!("Life lost, {remaining} left"),
        GameEvent::LifeRestored { remaining } => log::info!("Life restored, {remaining} left"),
        GameEvent::PracticeCleared { remaining } => {
            log::info!("Practice pass cleared, {remaining} to go")
        }
        GameEvent::RodExploded { rod_id, lane } => {
            log::info!("Rod {rod_id} exploded on lane {lane}")
        }
        GameEvent::LevelUp { level } => log::info!("Endless level {level}"),
        other => log::debug!("{other:?}"),
    }
}

/// Autoplayer: one press per target with a seeded timing spread, sent from
/// its own thread. Events are stamped ahead of time; the queue holds them
/// back until the song reaches them.
fn spawn_autoplay(state: &GameState, seed: u64, sender: InputSender) -> thread::JoinHandle<usize> {
    let mut rng = Pcg32::seed_from_u64(seed ^ 0xA11_0A7);
    let mut presses: Vec<InputEvent> = state
        .lanes
        .iter()
        .flat_map(|lane| lane.targets.iter())
        .filter_map(|target| {
            if rng.random_bool(AUTOPLAY_SKIP_CHANCE) {
                return None;
            }
            let at = state.tempo.beats_to_seconds(target.beat)
                + rng.random_range(-AUTOPLAY_SPREAD_SEC..=AUTOPLAY_SPREAD_SEC);
            Some(InputEvent::press(target.input_type, at.max(0.0)))
        })
        .collect();
    presses.sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));

    thread::spawn(move || {
        let mut sent = 0;
        for press in presses {
            if !sender.send(press) {
                break;
            }
            sender.send(InputEvent::release(press.button, press.timestamp_seconds + 0.05));
            sent += 1;
        }
        sent
    })
}

fn main() -> rod_rhythm::Result<()> {
    env_logger::init();
    log::info!("Rod Rhythm starting...");

    let mut args = std::env::args().skip(1);
    let schedule = match args.next() {
        Some(path) => Schedule::load(path)?,
        None => {
            log::info!("No schedule given, playing the demo chart");
            Schedule::demo()
        }
    };
    let settings = args
        .next()
        .map(Settings::load_or_default)
        .unwrap_or_default();

    let state = GameState::new(&schedule, &settings)?;
    let mut game = Game::new(state, &settings);
    let autoplay = spawn_autoplay(&game.state, settings.seed, game.queue.sender());

    while game.state.phase == GamePhase::Playing {
        game.update(FRAME_DT);
    }
    let sent = autoplay.join().unwrap_or(0);

    let session = &game.state.session;
    println!(
        "{} run {}: score {} ({:.1}%) | ace {} good {} barely {} miss {} | {} presses",
        settings.mode.as_str(),
        if game.state.phase == GamePhase::GameOver {
            "over"
        } else {
            "complete"
        },
        session.score,
        session.score_percent() * 100.0,
        session.counts.ace,
        session.counts.good,
        session.counts.barely,
        session.counts.miss,
        sent
    );

    if game.state.practice_restricted() {
        println!("Practice inputs not cleared; run not recorded");
        return Ok(());
    }

    let mut scores = HighScores::load(highscores::DEFAULT_PATH).unwrap_or_else(|e| {
        log::warn!("Could not read high scores: {e}");
        HighScores::new()
    });
    if let Some(rank) = scores.add_score(
        session.score,
        session.score_percent(),
        settings.mode,
        highscores::now_millis(),
    ) {
        println!("New high score! Rank #{rank}");
        game.audio.play(SoundEffect::HighScore);
        if let Err(e) = scores.save(highscores::DEFAULT_PATH) {
            log::warn!("Could not save high scores: {e}");
        }
    }

    Ok(())
}
