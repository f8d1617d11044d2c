use thiserror::Error;

/// Rejections raised by the phase timer and its configuration edits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("no phase is enabled, enable at least one phase before starting")]
    NoEnabledPhase,

    #[error("phase {index} has a duration of zero seconds")]
    ZeroDuration { index: usize },

    #[error("phases cannot be edited while a session is running or paused")]
    SessionActive,

    #[error("phase index {index} is out of range (0..{len})")]
    PhaseIndexOutOfRange { index: usize, len: usize },

    #[error("{secs}s is outside the allowed phase duration of {min}..={max}s")]
    DurationOutOfRange { secs: u32, min: u32, max: u32 },
}

/// Failures while reading exercise records or presets
#[derive(Error, Debug)]
pub enum ExerciseError {
    #[error("could not read exercise file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid exercise record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no exercise preset named '{0}'. Run with --list-presets to see them all.")]
    UnknownPreset(String),

    #[error("exercise file contains no records")]
    Empty,
}

/// Failures of the local session log
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("session database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not prepare session database directory: {0}")]
    Io(#[from] std::io::Error),
}
