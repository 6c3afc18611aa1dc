//! Load-time configuration errors
//!
//! Only schedule, tempo, settings and score-table loading can fail. The
//! simulation step itself never returns an error: bad timing is a `Miss`.

/// Result alias that carries [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("tempo map has no tempo changes")]
    EmptyTempoMap,
    #[error("tempo change {index} at beat {beat} does not come after the previous change")]
    NonIncreasingTempo { index: usize, beat: f64 },
    #[error("tempo change {index} has invalid bpm {bpm}")]
    InvalidTempo { index: usize, bpm: f64 },
    #[error("rod deployment references lane {lane}, which has no targets")]
    UnknownLane { lane: usize },
    #[error("rod deployment {index} is invalid: {reason}")]
    InvalidRod { index: usize, reason: &'static str },
    #[error(
        "accuracy table thresholds must satisfy 0 < ace <= good <= barely <= 1 \
         and a positive window"
    )]
    InvalidAccuracyTable,
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}
