//! Compiled block/target schedule
//!
//! A schedule is the output of an external chart compiler: the tempo map,
//! every lane target, and the beats at which rods are deployed.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{ConfigError, Result};
use crate::input::InputType;
use crate::sim::lane::{Lane, Target};
use crate::sim::rod::{Rod, RodKind};
use crate::sim::tempo::{TempoChange, TempoMap};

/// Float slack when comparing window edges in seconds
const WINDOW_SLACK: f64 = 1e-9;

/// One expected press on one lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub beat: f64,
    pub lane: usize,
    pub input: InputType,
}

fn default_x_units_per_beat() -> f64 {
    DEFAULT_X_UNITS_PER_BEAT
}

/// A rod entering a lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RodDeployment {
    pub beat: f64,
    pub lane: usize,
    #[serde(default)]
    pub origin_block: usize,
    #[serde(default = "default_x_units_per_beat")]
    pub x_units_per_beat: f64,
    #[serde(default)]
    pub kind: RodKind,
}

/// Practice-mode required input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeInput {
    pub beat: f64,
    pub input: InputType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub tempo: Vec<TempoChange>,
    pub targets: Vec<TargetRecord>,
    pub rods: Vec<RodDeployment>,
    pub skill_bonus_beat: Option<f64>,
    pub practice: Vec<PracticeInput>,
    pub practice_clears: u32,
}

impl Schedule {
    /// Empty schedule at a constant tempo
    pub fn with_tempo(beats_per_minute: f64) -> Self {
        Self {
            tempo: vec![TempoChange::new(0.0, beats_per_minute)],
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let schedule = Self::from_json(&json)?;
        log::info!(
            "Loaded schedule from {}: {} targets, {} rods",
            path.display(),
            schedule.targets.len(),
            schedule.rods.len()
        );
        Ok(schedule)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn tempo_map(&self) -> Result<TempoMap> {
        TempoMap::new(self.tempo.clone())
    }

    /// Group targets into lanes ordered by lane id. A lane takes the input
    /// type of its earliest target.
    pub fn build_lanes(&self) -> Vec<Lane> {
        let mut grouped: BTreeMap<usize, Vec<Target>> = BTreeMap::new();
        for record in &self.targets {
            grouped
                .entry(record.lane)
                .or_default()
                .push(Target::new(record.beat, record.input));
        }

        grouped
            .into_iter()
            .map(|(id, targets)| {
                let input_type = targets
                    .iter()
                    .min_by(|a, b| a.beat.total_cmp(&b.beat))
                    .map(|t| t.input_type)
                    .unwrap_or(InputType::A);
                Lane::new(id, input_type, targets)
            })
            .collect()
    }

    /// Check rod deployments against the lanes they reference.
    ///
    /// Every block a rod expects must stay judgeable for the whole late
    /// window: the rod may not reach the trailing-edge wall stop, or retire,
    /// before `max_offset_sec` has passed.
    pub fn validate(&self, lanes: &[Lane], tempo: &TempoMap, max_offset_sec: f64) -> Result<()> {
        for (index, rod) in self.rods.iter().enumerate() {
            if !rod.beat.is_finite() {
                return Err(ConfigError::InvalidRod {
                    index,
                    reason: "deploy beat is not finite",
                });
            }
            if !rod.x_units_per_beat.is_finite() || rod.x_units_per_beat <= 0.0 {
                return Err(ConfigError::InvalidRod {
                    index,
                    reason: "x units per beat must be positive",
                });
            }
            let lane = lanes
                .iter()
                .find(|l| l.id == rod.lane)
                .ok_or(ConfigError::UnknownLane { lane: rod.lane })?;
            if rod.origin_block >= lane.len() {
                return Err(ConfigError::InvalidRod {
                    index,
                    reason: "origin block is past the end of its lane",
                });
            }
            check_late_window(index, rod, lane, tempo, max_offset_sec)?;
        }
        Ok(())
    }

    /// Append a rod deployed at `deploy_beat` plus `count` targets at the
    /// beats it reaches each block. Runs on one lane must be pushed in order.
    /// Returns the run's origin block.
    pub fn push_run(
        &mut self,
        lane: usize,
        input: InputType,
        deploy_beat: f64,
        count: usize,
        x_units_per_beat: f64,
        kind: RodKind,
    ) -> usize {
        let origin_block = self.targets.iter().filter(|t| t.lane == lane).count();
        for k in 0..count {
            self.targets.push(TargetRecord {
                beat: deploy_beat + LEAD_BEATS + k as f64 / x_units_per_beat,
                lane,
                input,
            });
        }
        self.rods.push(RodDeployment {
            beat: deploy_beat,
            lane,
            origin_block,
            x_units_per_beat,
            kind,
        });
        origin_block
    }

    /// Short two-lane chart with a mid-song tempo change
    pub fn demo() -> Self {
        let mut schedule = Self::with_tempo(120.0);
        schedule.tempo.push(TempoChange::new(16.0, 150.0));

        schedule.push_run(0, InputType::A, 0.0, 4, 1.0, RodKind::Standard);
        schedule.push_run(1, InputType::DPad, 2.0, 4, 1.0, RodKind::Heavy);
        schedule.push_run(0, InputType::A, 6.0, 4, 2.0, RodKind::Standard);
        schedule.push_run(1, InputType::DPad, 8.0, 3, 1.0, RodKind::Standard);
        schedule.push_run(0, InputType::A, 12.0, 2, 1.0, RodKind::Lofty);
        schedule.push_run(1, InputType::DPad, 15.0, 4, 1.0, RodKind::Standard);

        schedule.skill_bonus_beat = Some(4.0);
        schedule.practice = vec![
            PracticeInput {
                beat: 1.0,
                input: InputType::A,
            },
            PracticeInput {
                beat: 3.0,
                input: InputType::DPad,
            },
        ];
        schedule.practice_clears = 1;
        schedule
    }
}

fn check_late_window(
    index: usize,
    deployment: &RodDeployment,
    lane: &Lane,
    tempo: &TempoMap,
    max_offset_sec: f64,
) -> Result<()> {
    let rod = Rod::deploy(
        0,
        lane,
        deployment.beat,
        deployment.origin_block,
        deployment.x_units_per_beat,
        deployment.kind,
    );
    let stop_beats = (TRAILING_EDGE - 0.5) / deployment.x_units_per_beat;
    let retire_seconds = tempo.beats_to_seconds(deployment.beat + ROD_LIFETIME_BEATS);

    for block in rod.pending_indices() {
        let perfect_beat = rod.perfect_beat(block);
        let perfect_seconds = tempo.beats_to_seconds(perfect_beat);
        let closes_at = perfect_seconds + max_offset_sec;

        if tempo.beats_to_seconds(perfect_beat + stop_beats) < closes_at - WINDOW_SLACK {
            return Err(ConfigError::InvalidRod {
                index,
                reason: "rod is too fast: it hits the wall before the late window closes",
            });
        }
        if closes_at > retire_seconds + WINDOW_SLACK {
            return Err(ConfigError::InvalidRod {
                index,
                reason: "rod retires before its last block's late window closes",
            });
        }
    }
    Ok(())
}
