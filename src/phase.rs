use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::TimerError;

/// Durations the free editor accepts for a single phase, in seconds
pub const FREE_PHASE_DURATION_SECS: RangeInclusive<u32> = 1..=30;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    #[strum(to_string = "Inhale")]
    Inhale,
    #[strum(to_string = "Hold")]
    HoldAfterInhale,
    #[strum(to_string = "Exhale")]
    Exhale,
    #[strum(to_string = "Hold out")]
    HoldAfterExhale,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 4] = [
        PhaseKind::Inhale,
        PhaseKind::HoldAfterInhale,
        PhaseKind::Exhale,
        PhaseKind::HoldAfterExhale,
    ];

    /// Short instruction shown while the phase is running
    pub fn cue(&self) -> &'static str {
        match self {
            PhaseKind::Inhale => "breathe in",
            PhaseKind::HoldAfterInhale => "hold your breath",
            PhaseKind::Exhale => "breathe out",
            PhaseKind::HoldAfterExhale => "stay empty",
        }
    }
}

/// One timed step of a breathing cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub kind: PhaseKind,
    pub duration_secs: u32,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Free-form label set in the editor; falls back to the kind's name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

impl Phase {
    pub fn new(kind: PhaseKind, duration_secs: u32) -> Self {
        Self {
            kind,
            duration_secs,
            enabled: true,
            label: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn display_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.kind.to_string())
    }

    pub fn duration_ms(&self) -> u64 {
        u64::from(self.duration_secs) * 1000
    }
}

/// Indices of the enabled phases, in configuration order
pub fn enabled_indices(phases: &[Phase]) -> Vec<usize> {
    phases
        .iter()
        .enumerate()
        .filter(|(_, p)| p.enabled)
        .map(|(i, _)| i)
        .collect()
}

pub fn cycle_duration_secs(phases: &[Phase]) -> u64 {
    phases
        .iter()
        .filter(|p| p.enabled)
        .map(|p| u64::from(p.duration_secs))
        .sum()
}

/// Checks that a phase list can drive a session
pub fn validate(phases: &[Phase]) -> Result<(), TimerError> {
    let mut any_enabled = false;
    for (index, phase) in phases.iter().enumerate() {
        if !phase.enabled {
            continue;
        }
        any_enabled = true;
        if phase.duration_secs == 0 {
            return Err(TimerError::ZeroDuration { index });
        }
    }

    if any_enabled {
        Ok(())
    } else {
        Err(TimerError::NoEnabledPhase)
    }
}

fn check_index(phases: &[Phase], index: usize) -> Result<(), TimerError> {
    if index < phases.len() {
        Ok(())
    } else {
        Err(TimerError::PhaseIndexOutOfRange {
            index,
            len: phases.len(),
        })
    }
}

/// Removes the phase at `from` and reinserts it at `to`
pub fn move_phase(phases: &mut Vec<Phase>, from: usize, to: usize) -> Result<(), TimerError> {
    check_index(phases, from)?;
    check_index(phases, to)?;

    if from != to {
        let phase = phases.remove(from);
        phases.insert(to, phase);
    }
    Ok(())
}

/// Flips the enabled flag and returns the new value
pub fn toggle_phase(phases: &mut [Phase], index: usize) -> Result<bool, TimerError> {
    check_index(phases, index)?;
    let phase = &mut phases[index];
    phase.enabled = !phase.enabled;
    Ok(phase.enabled)
}

pub fn set_phase_duration(phases: &mut [Phase], index: usize, secs: u32) -> Result<(), TimerError> {
    check_index(phases, index)?;
    if !FREE_PHASE_DURATION_SECS.contains(&secs) {
        return Err(TimerError::DurationOutOfRange {
            secs,
            min: *FREE_PHASE_DURATION_SECS.start(),
            max: *FREE_PHASE_DURATION_SECS.end(),
        });
    }
    phases[index].duration_secs = secs;
    Ok(())
}

/// Steps a duration by `delta` seconds, clamped into the editor range
pub fn adjust_phase_duration(
    phases: &mut [Phase],
    index: usize,
    delta: i32,
) -> Result<u32, TimerError> {
    check_index(phases, index)?;
    let current = i64::from(phases[index].duration_secs);
    let min = i64::from(*FREE_PHASE_DURATION_SECS.start());
    let max = i64::from(*FREE_PHASE_DURATION_SECS.end());
    let next = (current + i64::from(delta)).clamp(min, max) as u32;
    phases[index].duration_secs = next;
    Ok(next)
}

/// Four-phase box used by the free editor until the user saves their own
pub fn default_free_phases() -> Vec<Phase> {
    vec![
        Phase::new(PhaseKind::Inhale, 4),
        Phase::new(PhaseKind::HoldAfterInhale, 4),
        Phase::new(PhaseKind::Exhale, 4),
        Phase::new(PhaseKind::HoldAfterExhale, 4).disabled(),
    ]
}
