use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Completed,
}

/// How a session is bounded and how often it is ticked
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerSettings {
    pub granularity: TickGranularity,
    /// Complete as soon as the total duration budget is spent, whatever the phase
    pub duration_ceiling: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickGranularity {
    /// Tick every `n` milliseconds
    Fixed(u64),
    /// Tick every 1% of the running phase's duration
    PercentOfPhase,
}

pub const GUIDED_TICK_MS: u64 = 50;
/// Accepted guided tick lengths, in milliseconds
pub const GUIDED_TICK_RANGE_MS: RangeInclusive<u64> = 1..=1000;

impl TimerSettings {
    pub fn guided(tick_ms: u64) -> Self {
        Self {
            granularity: TickGranularity::Fixed(tick_ms.max(1)),
            duration_ceiling: true,
        }
    }

    pub fn free() -> Self {
        Self {
            granularity: TickGranularity::PercentOfPhase,
            duration_ceiling: false,
        }
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self::guided(GUIDED_TICK_MS)
    }
}

/// Runtime state of one session; zeroed on start and reset
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub status: TimerStatus,
    pub elapsed_ms: u64,
    /// Position in the enabled subsequence, not in the configuration list
    pub current_phase_index: usize,
    pub phase_elapsed_ms: u64,
    pub cycle_count: u64,
    pub completed: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: TimerStatus::Idle,
            elapsed_ms: 0,
            current_phase_index: 0,
            phase_elapsed_ms: 0,
            cycle_count: 0,
            completed: false,
        }
    }
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self.status, TimerStatus::Running | TimerStatus::Paused)
    }
}
