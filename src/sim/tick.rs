//! Fixed timestep simulation tick
//!
//! One tick: judge the presses drained this frame, spawn due rods, update
//! lanes (pistons, timeouts), integrate rods, then retire expired rods.

use super::collision::{floor_height, rod_wall_collision};
use super::judge::{AccuracyClass, judge};
use super::lane::TargetState;
use super::rod::ExpectedState;
use super::state::{GameEvent, GamePhase, GameState};
use crate::audio::SoundEffect;
use crate::consts::*;
use crate::input::InputEvent;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Button edges drained from the input queue, oldest first
    pub presses: Vec<InputEvent>,
    /// Pause toggle
    pub pause: bool,
}

/// Advance the game state by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput, dt: f64) {
    // Handle pause toggle
    if input.pause {
        match state.phase {
            GamePhase::Playing => {
                state.phase = GamePhase::Paused;
                log::info!("Paused at {:.3}s", state.song_seconds);
                return;
            }
            GamePhase::Paused => state.phase = GamePhase::Playing,
            _ => {}
        }
    }

    // Don't tick if paused or the round is over
    if state.phase != GamePhase::Playing {
        return;
    }

    state.time_ticks += 1;
    state.song_seconds += dt;

    for event in input.presses.iter().filter(|e| e.pressed) {
        let at_seconds = event.timestamp_seconds + state.input_offset_sec;
        judge(state, event.button, at_seconds);
    }

    let now_beat = state.now_beat();
    state.deploy_due(now_beat);
    update_lanes(state, now_beat);
    integrate_rods(state, now_beat, dt);
    retire_rods(state, now_beat);

    if state.session.game_over {
        state.phase = GamePhase::GameOver;
    } else if state.is_round_complete() {
        state.phase = GamePhase::Finished;
        log::info!(
            "Round complete: score {} ({:.1}%)",
            state.session.score,
            state.session.score_percent() * 100.0
        );
        state.events.push(GameEvent::RoundComplete);
        state.events.push(GameEvent::PlaySound(SoundEffect::RoundComplete));
    }
}

/// Fire due pistons and time out targets whose late window has closed
fn update_lanes(state: &mut GameState, now_beat: f64) {
    let late_window = state.effective_accuracy().max_offset_sec;

    for slot in 0..state.lanes.len() {
        if !state.lanes[slot].trigger_due(now_beat).is_empty() {
            state.events.push(GameEvent::PlaySound(SoundEffect::Piston));
        }

        let timed_out =
            state.lanes[slot].advance_active_index(state.song_seconds, &state.tempo, late_window);
        let lane_id = state.lanes[slot].id;

        for index in timed_out {
            let owners = state
                .rods
                .iter_mut()
                .filter(|r| r.lane == lane_id)
                .map(|rod| rod.resolve(index, ExpectedState::Missed))
                .filter(|&resolved| resolved)
                .count();
            if owners == 0 {
                continue;
            }
            log::debug!("lane {} block {} timed out", lane_id, index);
            state.events.push(GameEvent::Flash {
                lane: lane_id,
                class: AccuracyClass::Miss,
            });
            state.events.push(GameEvent::PlaySound(SoundEffect::Miss));
            for _ in 0..owners {
                state.session.missed(&mut state.events);
            }
        }
    }
}

/// Move every live rod: x from the beat (until a wall stops it), y from its
/// bounce arc or from gravity
fn integrate_rods(state: &mut GameState, now_beat: f64, dt: f64) {
    for rod in state.rods.iter_mut() {
        if rod.killed || rod.exploded {
            continue;
        }
        let Some(lane) = state.lanes.iter().find(|l| l.id == rod.lane) else {
            continue;
        };

        // Horizontal
        if !rod.collision.collided_with_wall {
            let from_x = rod.position.x;
            let to_x = rod.x_at(now_beat);
            let y = match rod.collision.bounce_arc {
                Some(arc) => arc.y_at(to_x),
                None => rod.position.y,
            };

            let wall = rod_wall_collision(lane, from_x, to_x, y, now_beat);
            if wall.hit {
                rod.collision.collided_with_wall = true;
                rod.collision.bounce_arc = None;
                rod.position.x = wall.clamp_x;
                log::debug!(
                    "rod {} hit the block in segment {} at beat {:.3}",
                    rod.id,
                    wall.segment,
                    now_beat
                );
                state.events.push(GameEvent::PlaySound(SoundEffect::Crash));
            } else {
                rod.position.x = to_x;
            }
        }

        // Vertical
        let x = rod.position.x;
        let floor = floor_height(lane, x, rod.position.y, now_beat);

        if let Some(arc) = rod.collision.bounce_arc {
            let y = arc.y_at(x);
            let descending = x >= arc.mid_x();
            if arc.is_complete_at(x) || (descending && y <= floor) {
                rod.position.y = floor;
                rod.collision.bounce_arc = None;
                rod.collision.velocity_y = 0.0;
                state.events.push(GameEvent::PlaySound(SoundEffect::Land));
            } else {
                // Carried into free fall if a wall clears the arc mid-air
                rod.collision.velocity_y = (y - rod.position.y) / dt;
                rod.position.y = y;
            }
            continue;
        }

        // Free fall
        if rod.position.y > floor || rod.collision.velocity_y > 0.0 {
            rod.collision.velocity_y -= GRAVITY * rod.kind.gravity_scale() * dt;
            rod.position.y += rod.collision.velocity_y * dt;
            if rod.position.y <= floor {
                rod.position.y = floor;
                rod.collision.velocity_y = 0.0;
                state.events.push(GameEvent::PlaySound(SoundEffect::Land));
            }
        } else {
            rod.position.y = floor;
            rod.collision.velocity_y = 0.0;
        }
    }
}

/// Kill rods past their lifetime. A rod with no hit explodes first. Any
/// block still expected is flushed to the score and to its lane as missed.
fn retire_rods(state: &mut GameState, now_beat: f64) {
    let mut slot = 0;
    while slot < state.rods.len() {
        if state.rods[slot].beats_alive(now_beat) <= ROD_LIFETIME_BEATS {
            slot += 1;
            continue;
        }

        let mut rod = state.rods.remove(slot);
        if !rod.has_successful_judgment() {
            rod.explode();
            state.session.rod_exploded(&rod, &mut state.events);
        }
        if rod.kill().is_some() {
            log::trace!("rod {} killed mid-arc", rod.id);
        }

        let flushed = state
            .session
            .submit_rod_results(&rod, &state.results, &mut state.events);
        if let Some(lane_slot) = state.lane_slot(rod.lane) {
            for index in flushed {
                state.lanes[lane_slot].post(index, TargetState::Missed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputType;
    use crate::schedule::Schedule;
    use crate::settings::{SessionMode, Settings};
    use crate::sim::collision::wall_stop_x;
    use crate::sim::rod::RodKind;
    use proptest::prelude::*;

    fn state_for(schedule: &Schedule, settings: &Settings) -> GameState {
        GameState::new(schedule, settings).unwrap()
    }

    fn one_run(kind: RodKind) -> Schedule {
        let mut schedule = Schedule::with_tempo(120.0);
        schedule.push_run(0, InputType::A, 1.0, 3, 1.0, kind);
        schedule
    }

    /// Song times of every target, paired with its button
    fn perfect_presses(state: &GameState) -> Vec<InputEvent> {
        let mut presses: Vec<InputEvent> = state
            .lanes
            .iter()
            .flat_map(|lane| lane.targets.iter())
            .map(|t| InputEvent::press(t.input_type, state.tempo.beats_to_seconds(t.beat)))
            .collect();
        presses.sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));
        presses
    }

    /// Tick until the round ends, feeding each press on the tick that reaches it
    fn play(state: &mut GameState, presses: &[InputEvent], max_ticks: usize) {
        let mut next = 0;
        for _ in 0..max_ticks {
            if state.phase != GamePhase::Playing {
                break;
            }
            let until = state.song_seconds + SIM_DT;
            let start = next;
            while next < presses.len() && presses[next].timestamp_seconds <= until {
                next += 1;
            }
            let input = TickInput {
                presses: presses[start..next].to_vec(),
                pause: false,
            };
            tick(state, &input, SIM_DT);
        }
    }

    #[test]
    fn test_tick_pause() {
        let mut state = state_for(&one_run(RodKind::Standard), &Settings::default());
        tick(&mut state, &TickInput::default(), SIM_DT);
        let before = state.song_seconds;

        let input = TickInput {
            pause: true,
            ..Default::default()
        };
        tick(&mut state, &input, SIM_DT);
        assert_eq!(state.phase, GamePhase::Paused);
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.song_seconds, before);

        // Unpause
        tick(&mut state, &input, SIM_DT);
        assert_eq!(state.phase, GamePhase::Playing);
        assert!(state.song_seconds > before);
    }

    #[test]
    fn test_unpressed_rod_stops_at_first_piston() {
        let mut state = state_for(&one_run(RodKind::Standard), &Settings::default());
        state.advance_to_beat(2.6);

        let rod = &state.rods[0];
        assert!(rod.collision.collided_with_wall);
        assert!(!rod.accepting_inputs());
        assert!((rod.position.x - wall_stop_x(0)).abs() < 1e-9);
        assert_eq!(rod.position.y, BASE_ROW_HEIGHT);
        // Block 0 timed out
        assert_eq!(state.session.counts.miss, 1);
        assert_eq!(rod.tracked_targets[0], ExpectedState::Missed);
    }

    #[test]
    fn test_perfect_play_clears_every_piston() {
        for kind in [RodKind::Standard, RodKind::Heavy] {
            let mut state = state_for(&one_run(kind), &Settings::default());
            let presses = perfect_presses(&state);
            play(&mut state, &presses, 2_000);

            assert_eq!(state.phase, GamePhase::Finished, "{}", kind.as_str());
            assert_eq!(state.session.counts.ace, 3);
            assert_eq!(state.session.counts.miss, 0);
            assert!(state.session.is_perfect_run());
            assert!((state.session.score_percent() - 1.0).abs() < 1e-12);
            let events = state.drain_events();
            assert!(events.contains(&GameEvent::RoundComplete));
            assert!(!events.contains(&GameEvent::PlaySound(SoundEffect::Crash)));
        }
    }

    #[test]
    fn test_bounce_lands_back_on_base_row() {
        let mut state = state_for(&one_run(RodKind::Standard), &Settings::default());
        let presses = perfect_presses(&state);
        play(&mut state, &presses[..1], 150);

        // Beat 2.5: mid-air after the first bounce
        let rod = &state.rods[0];
        assert!(rod.is_airborne());
        assert!(rod.position.y > PISTON_HEIGHT);

        play(&mut state, &[], 80);
        let rod = &state.rods[0];
        assert!(!rod.is_airborne());
        assert_eq!(rod.position.y, BASE_ROW_HEIGHT);
    }

    #[test]
    fn test_arc_velocity_follows_the_curve() {
        let mut state = state_for(&one_run(RodKind::Standard), &Settings::default());
        let presses = perfect_presses(&state);
        play(&mut state, &presses[..1], 130);
        assert!(state.rods[0].collision.bounce_arc.is_some());

        let mut samples = Vec::new();
        for _ in 0..80 {
            tick(&mut state, &TickInput::default(), SIM_DT);
            let rod = &state.rods[0];
            if rod.collision.bounce_arc.is_none() {
                // Landed this tick
                assert_eq!(rod.collision.velocity_y, 0.0);
                break;
            }
            samples.push(rod.collision.velocity_y);
        }
        assert!(samples.iter().any(|&vy| vy > 0.0));
        assert!(samples.iter().any(|&vy| vy < 0.0));
    }

    #[test]
    fn test_free_fall_landing_plays_land_sound() {
        let mut state = state_for(&one_run(RodKind::Standard), &Settings::default());
        state.advance_to_beat(1.2);
        state.drain_events();
        state.rods[0].position.y = 2.0;

        play(&mut state, &[], 60);
        let rod = &state.rods[0];
        assert_eq!(rod.position.y, BASE_ROW_HEIGHT);
        assert_eq!(rod.collision.velocity_y, 0.0);
        let lands = state
            .drain_events()
            .into_iter()
            .filter(|e| *e == GameEvent::PlaySound(SoundEffect::Land))
            .count();
        assert_eq!(lands, 1);
    }

    #[test]
    fn test_late_press_lands_before_wall_stop() {
        // 2 units/beat at 120 bpm: the wall stop comes ~88ms after the perfect beat
        let mut schedule = Schedule::with_tempo(120.0);
        schedule.push_run(0, InputType::A, 1.0, 3, 2.0, RodKind::Standard);
        let mut state = state_for(&schedule, &Settings::default());
        let mut presses = perfect_presses(&state);
        presses.truncate(1);
        presses[0].timestamp_seconds += 0.04;

        play(&mut state, &presses, 140);
        assert_eq!(state.results.len(), 1);
        assert_eq!(state.results[0].accuracy_class, AccuracyClass::Barely);
    }

    #[test]
    fn test_endless_level_narrows_window() {
        let mut schedule = Schedule::with_tempo(120.0);
        for run in 0..5 {
            schedule.push_run(0, InputType::A, run as f64 * 6.0, 4, 1.0, RodKind::Standard);
        }
        let late = 0.049;

        let class_of_late_press = |mode: SessionMode| {
            let settings = Settings::for_mode(mode);
            let mut state = state_for(&schedule, &settings);
            let mut presses = perfect_presses(&state);
            presses.truncate(ENDLESS_LEVEL_STEP as usize + 1);
            presses[ENDLESS_LEVEL_STEP as usize].timestamp_seconds += late;
            play(&mut state, &presses, 2_000);

            assert_eq!(state.session.counts.ace, ENDLESS_LEVEL_STEP);
            state.results[ENDLESS_LEVEL_STEP as usize].accuracy_class
        };

        // Inside the full window, outside the level-1 window
        assert_eq!(class_of_late_press(SessionMode::Standard), AccuracyClass::Barely);
        assert_eq!(class_of_late_press(SessionMode::Endless), AccuracyClass::Miss);
    }

    #[test]
    fn test_unhit_rod_explodes_at_end_of_life() {
        let mut state = state_for(&one_run(RodKind::Standard), &Settings::default());
        play(&mut state, &[], 2_000);

        assert_eq!(state.phase, GamePhase::Finished);
        assert_eq!(state.session.explosions, 1);
        assert_eq!(state.session.counts.miss, 4);
        assert!(state.session.is_reconciled());
        let events = state.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::RodExploded { rod_id: 1, .. })));
    }

    #[test]
    fn test_endless_runs_out_of_lives() {
        let settings = Settings {
            mode: SessionMode::Endless,
            max_lives: 2,
            ..Default::default()
        };
        let mut state = state_for(&one_run(RodKind::Standard), &settings);
        play(&mut state, &[], 2_000);

        assert_eq!(state.phase, GamePhase::GameOver);
        assert_eq!(state.session.lives, 0);
        let overs = state
            .drain_events()
            .into_iter()
            .filter(|e| *e == GameEvent::GameOver)
            .count();
        assert_eq!(overs, 1);
    }

    #[test]
    fn test_input_offset_is_applied() {
        let settings = Settings {
            input_offset_sec: 0.02,
            ..Default::default()
        };
        let mut state = state_for(&one_run(RodKind::Standard), &settings);
        let presses = perfect_presses(&state);
        play(&mut state, &presses[..1], 200);
        assert_eq!(state.results.len(), 1);
        assert!((state.results[0].accuracy_sec - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_determinism() {
        // Two states with the same seed fed the same presses end identical
        let schedule = Schedule::demo();
        let settings = Settings {
            seed: 99_999,
            ..Default::default()
        };
        let mut state1 = state_for(&schedule, &settings);
        let mut state2 = state_for(&schedule, &settings);

        let presses: Vec<InputEvent> = perfect_presses(&state1)
            .into_iter()
            .enumerate()
            .map(|(i, mut p)| {
                p.timestamp_seconds += (i % 5) as f64 * 0.011 - 0.02;
                p
            })
            .collect();

        play(&mut state1, &presses, 5_000);
        play(&mut state2, &presses, 5_000);

        assert_eq!(state1.time_ticks, state2.time_ticks);
        assert_eq!(state1.results, state2.results);
        assert_eq!(state1.session.score, state2.session.score);
        assert_eq!(state1.phase, GamePhase::Finished);
        assert!(state1.session.is_reconciled());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn active_index_never_decreases(
            raw in prop::collection::vec((0.0f64..14.0, any::<bool>()), 0..48)
        ) {
            let mut presses: Vec<InputEvent> = raw
                .into_iter()
                .map(|(t, a)| InputEvent::press(if a { InputType::A } else { InputType::DPad }, t))
                .collect();
            presses.sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));

            let mut state = state_for(&Schedule::demo(), &Settings::default());
            let mut last: Vec<usize> = state.lanes.iter().map(|l| l.active_index()).collect();
            let mut next = 0;

            for _ in 0..5_000 {
                if state.phase != GamePhase::Playing {
                    break;
                }
                let until = state.song_seconds + SIM_DT;
                let start = next;
                while next < presses.len() && presses[next].timestamp_seconds <= until {
                    next += 1;
                }
                let input = TickInput { presses: presses[start..next].to_vec(), pause: false };
                tick(&mut state, &input, SIM_DT);

                for (lane, prev) in state.lanes.iter().zip(last.iter_mut()) {
                    prop_assert!(lane.active_index() >= *prev);
                    *prev = lane.active_index();
                }
            }

            prop_assert_eq!(state.phase, GamePhase::Finished);
            prop_assert!(state.session.is_reconciled());
        }
    }
}
