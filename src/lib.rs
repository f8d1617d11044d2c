// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod exercise;
pub mod history;
pub mod logging;
pub mod phase;
pub mod player;
pub mod presets;
pub mod runtime;
pub mod session;
pub mod timer;
pub mod util;

pub use error::{ExerciseError, HistoryError, TimerError};
pub use phase::{Phase, PhaseKind};
pub use player::Player;
pub use timer::{PhaseTimer, TimerEvent};
