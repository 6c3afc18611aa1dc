//! Button events and the capture-thread input queue
//!
//! Input capture runs on its own thread (or an OS callback). Events are sent
//! over a channel and only judged when the simulation thread drains them, so
//! judging never runs concurrently with rod integration.

use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};

/// The two button classes a target can require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputType {
    #[serde(alias = "ButtonA")]
    A,
    #[serde(alias = "ButtonDPad")]
    DPad,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::A => "A",
            InputType::DPad => "D-Pad",
        }
    }
}

/// A button edge stamped with song time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub button: InputType,
    /// Only the press edge triggers judgment
    pub pressed: bool,
    pub timestamp_seconds: f64,
}

impl InputEvent {
    pub fn press(button: InputType, timestamp_seconds: f64) -> Self {
        Self {
            button,
            pressed: true,
            timestamp_seconds,
        }
    }

    pub fn release(button: InputType, timestamp_seconds: f64) -> Self {
        Self {
            button,
            pressed: false,
            timestamp_seconds,
        }
    }
}

/// Cloneable handle for the capture side
#[derive(Debug, Clone)]
pub struct InputSender {
    tx: Sender<InputEvent>,
}

impl InputSender {
    /// Returns false once the simulation side has been dropped
    pub fn send(&self, event: InputEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Simulation-side end of the input channel
#[derive(Debug)]
pub struct InputQueue {
    tx: Sender<InputEvent>,
    rx: Receiver<InputEvent>,
    /// Received events stamped after the song time of the last drain
    backlog: Vec<InputEvent>,
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InputQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            backlog: Vec::new(),
        }
    }

    pub fn sender(&self) -> InputSender {
        InputSender {
            tx: self.tx.clone(),
        }
    }

    /// Take every event stamped at or before `now_seconds`, oldest first.
    /// Later events stay queued for a future drain.
    pub fn drain_until(&mut self, now_seconds: f64) -> Vec<InputEvent> {
        self.backlog.extend(self.rx.try_iter());
        self.backlog
            .sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));

        let split = self
            .backlog
            .partition_point(|e| e.timestamp_seconds <= now_seconds);
        let later = self.backlog.split_off(split);
        std::mem::replace(&mut self.backlog, later)
    }

    /// Events waiting for their timestamp to come due
    pub fn pending(&self) -> usize {
        self.backlog.len()
    }
}
