//! Sound effect requests
//!
//! The simulation only queues `PlaySound` events; the caller drains them into
//! an [`AudioManager`], which hands each one to a backend without waiting for
//! playback. Effects are procedural tones - no sample files needed.

use crate::sim::judge::AccuracyClass;
use crate::sim::state::GameEvent;

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundEffect {
    /// Bounce on a best-tier press
    Ace,
    Good,
    Barely,
    /// Press judged as a miss, forfeited or timed out
    Miss,
    /// Rod lands at the end of an arc
    Land,
    /// Piston extends under a block
    Piston,
    /// Rod stopped by a raised block
    Crash,
    /// Rod expired without a single hit
    Explode,
    PerfectFail,
    SkillBonus,
    GameOver,
    PracticeClear,
    RoundComplete,
    /// New high score
    HighScore,
}

/// A short procedural tone: notes played back to back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequencies: &'static [f32],
    /// Seconds per note
    pub note_length: f32,
    pub gain: f32,
}

impl SoundEffect {
    pub fn for_class(class: AccuracyClass) -> Self {
        match class {
            AccuracyClass::Ace => SoundEffect::Ace,
            AccuracyClass::Good => SoundEffect::Good,
            AccuracyClass::Barely => SoundEffect::Barely,
            AccuracyClass::Miss => SoundEffect::Miss,
        }
    }

    pub fn tone(&self) -> Tone {
        let (frequencies, note_length, gain): (&'static [f32], f32, f32) = match self {
            SoundEffect::Ace => (&[880.0, 1320.0], 0.05, 0.5),
            SoundEffect::Good => (&[660.0, 880.0], 0.05, 0.45),
            SoundEffect::Barely => (&[520.0], 0.06, 0.4),
            SoundEffect::Miss => (&[180.0, 140.0], 0.08, 0.4),
            SoundEffect::Land => (&[220.0], 0.03, 0.25),
            SoundEffect::Piston => (&[330.0], 0.02, 0.2),
            SoundEffect::Crash => (&[120.0, 90.0], 0.1, 0.6),
            SoundEffect::Explode => (&[200.0, 150.0, 100.0, 60.0], 0.07, 0.6),
            SoundEffect::PerfectFail => (&[400.0, 350.0, 300.0, 200.0], 0.08, 0.5),
            SoundEffect::SkillBonus => (&[1200.0, 1800.0, 2400.0], 0.06, 0.5),
            SoundEffect::GameOver => (&[400.0, 350.0, 300.0, 200.0], 0.2, 0.6),
            SoundEffect::PracticeClear => (&[600.0, 800.0, 1000.0], 0.08, 0.5),
            SoundEffect::RoundComplete => (&[400.0, 500.0, 600.0, 800.0], 0.1, 0.5),
            SoundEffect::HighScore => (&[500.0, 600.0, 700.0, 800.0, 1000.0], 0.1, 0.6),
        };
        Tone {
            frequencies,
            note_length,
            gain,
        }
    }
}

/// Something that can start a tone. Must not block.
pub trait SfxBackend: Send {
    fn play(&mut self, effect: SoundEffect, tone: Tone, volume: f32);
}

/// Backend that only logs requests (headless runs and tests)
#[derive(Debug, Default)]
pub struct LogBackend;

impl SfxBackend for LogBackend {
    fn play(&mut self, effect: SoundEffect, tone: Tone, volume: f32) {
        log::debug!(
            "sfx {:?}: {} notes @ {:.2}",
            effect,
            tone.frequencies.len(),
            volume * tone.gain
        );
    }
}

/// Audio manager for the game
pub struct AudioManager {
    backend: Box<dyn SfxBackend>,
    master_volume: f32,
    sfx_volume: f32,
    muted: bool,
}

impl Default for AudioManager {
    fn default() -> Self {
        Self::new(Box::new(LogBackend))
    }
}

impl AudioManager {
    pub fn new(backend: Box<dyn SfxBackend>) -> Self {
        Self {
            backend,
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }

    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    /// Set SFX volume (0.0 - 1.0)
    pub fn set_sfx_volume(&mut self, vol: f32) {
        self.sfx_volume = vol.clamp(0.0, 1.0);
    }

    /// Mute/unmute all audio
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume * self.sfx_volume
        }
    }

    /// Play a sound effect
    pub fn play(&mut self, effect: SoundEffect) {
        let vol = self.effective_volume();
        if vol <= 0.0 {
            return;
        }
        self.backend.play(effect, effect.tone(), vol);
    }

    /// Play every sound requested in `events`; returns how many were started
    pub fn dispatch(&mut self, events: &[GameEvent]) -> usize {
        let mut played = 0;
        for event in events {
            if let GameEvent::PlaySound(effect) = event {
                if self.effective_volume() > 0.0 {
                    played += 1;
                }
                self.play(*effect);
            }
        }
        played
    }
}
