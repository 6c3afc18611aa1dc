//! Tempo map: beat <-> seconds conversion
//!
//! Piecewise-linear over tempo segments. Beats before the first change are
//! extrapolated with the first tempo, so beat 0 is always at 0 seconds when
//! the first change sits at beat 0.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// A tempo change taking effect at `beat`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub beat: f64,
    #[serde(alias = "bpm")]
    pub beats_per_minute: f64,
}

impl TempoChange {
    pub fn new(beat: f64, beats_per_minute: f64) -> Self {
        Self {
            beat,
            beats_per_minute,
        }
    }

    #[inline]
    fn seconds_per_beat(&self) -> f64 {
        60.0 / self.beats_per_minute
    }
}

/// Validated, beat-sorted list of tempo changes
#[derive(Debug, Clone)]
pub struct TempoMap {
    changes: Vec<TempoChange>,
    /// Song time at which each change takes effect
    seconds_at: Vec<f64>,
}

impl TempoMap {
    /// Build a tempo map. Beats must be strictly increasing and every bpm
    /// finite and positive.
    pub fn new(changes: Vec<TempoChange>) -> Result<Self> {
        let Some(first) = changes.first() else {
            return Err(ConfigError::EmptyTempoMap);
        };

        let mut seconds_at = Vec::with_capacity(changes.len());
        seconds_at.push(first.beat * first.seconds_per_beat());

        for (index, change) in changes.iter().enumerate() {
            if !change.beats_per_minute.is_finite() || change.beats_per_minute <= 0.0 {
                return Err(ConfigError::InvalidTempo {
                    index,
                    bpm: change.beats_per_minute,
                });
            }
            if !change.beat.is_finite() {
                return Err(ConfigError::NonIncreasingTempo {
                    index,
                    beat: change.beat,
                });
            }
            if index == 0 {
                continue;
            }
            let prev = &changes[index - 1];
            if change.beat <= prev.beat {
                return Err(ConfigError::NonIncreasingTempo {
                    index,
                    beat: change.beat,
                });
            }
            let elapsed = (change.beat - prev.beat) * prev.seconds_per_beat();
            seconds_at.push(seconds_at[index - 1] + elapsed);
        }

        Ok(Self {
            changes,
            seconds_at,
        })
    }

    /// Single tempo starting at beat 0
    pub fn constant(beats_per_minute: f64) -> Result<Self> {
        Self::new(vec![TempoChange::new(0.0, beats_per_minute)])
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// Index of the segment governing `beat`
    fn segment_for_beat(&self, beat: f64) -> usize {
        self.changes
            .partition_point(|c| c.beat <= beat)
            .saturating_sub(1)
    }

    /// Index of the segment governing `seconds`
    fn segment_for_seconds(&self, seconds: f64) -> usize {
        self.seconds_at
            .partition_point(|&t| t <= seconds)
            .saturating_sub(1)
    }

    pub fn beats_to_seconds(&self, beat: f64) -> f64 {
        let k = self.segment_for_beat(beat);
        let change = &self.changes[k];
        self.seconds_at[k] + (beat - change.beat) * change.seconds_per_beat()
    }

    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        let k = self.segment_for_seconds(seconds);
        let change = &self.changes[k];
        change.beat + (seconds - self.seconds_at[k]) / change.seconds_per_beat()
    }

    /// Tempo in effect at `beat`
    pub fn bpm_at(&self, beat: f64) -> f64 {
        self.changes[self.segment_for_beat(beat)].beats_per_minute
    }
}
