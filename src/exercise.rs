use std::fs;
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::ExerciseError;
use crate::phase::{self, Phase, PhaseKind};
use crate::session::TimerSettings;
use crate::timer::PhaseTimer;

/// Exercise as entered in the back-office, with its field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    #[serde(default)]
    pub ex_id: Option<i64>,
    pub ex_nom: String,
    #[serde(default)]
    pub ex_description: Option<String>,
    /// seconds
    pub ex_inspiration: u32,
    /// seconds
    pub ex_apnee: u32,
    /// seconds
    pub ex_expiration: u32,
    /// minutes
    pub ex_duration: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseMode {
    Guided,
    Free,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exercise {
    pub name: String,
    pub description: Option<String>,
    pub mode: ExerciseMode,
    pub phases: Vec<Phase>,
    pub total_duration_secs: Option<u64>,
}

impl From<&ExerciseRecord> for Exercise {
    fn from(record: &ExerciseRecord) -> Self {
        let mut hold = Phase::new(PhaseKind::HoldAfterInhale, record.ex_apnee);
        // a hold of zero seconds keeps its slot but sits out of the rotation
        hold.enabled = record.ex_apnee > 0;

        Self {
            name: record.ex_nom.clone(),
            description: record.ex_description.clone(),
            mode: ExerciseMode::Guided,
            phases: vec![
                Phase::new(PhaseKind::Inhale, record.ex_inspiration),
                hold,
                Phase::new(PhaseKind::Exhale, record.ex_expiration),
            ],
            total_duration_secs: Some(u64::from(record.ex_duration) * 60),
        }
    }
}

impl Exercise {
    /// Guided exercise from raw timings, as typed on the command line
    pub fn guided(name: impl Into<String>, inhale: u32, hold: u32, exhale: u32, minutes: u32) -> Self {
        Exercise::from(&ExerciseRecord {
            ex_id: None,
            ex_nom: name.into(),
            ex_description: None,
            ex_inspiration: inhale,
            ex_apnee: hold,
            ex_expiration: exhale,
            ex_duration: minutes,
        })
    }

    pub fn free(phases: Vec<Phase>) -> Self {
        Self {
            name: "Free exercise".to_string(),
            description: None,
            mode: ExerciseMode::Free,
            phases,
            total_duration_secs: None,
        }
    }

    /// Timer settings matching the exercise mode
    pub fn timer_settings(&self, guided_tick_ms: u64) -> TimerSettings {
        match self.mode {
            ExerciseMode::Guided => TimerSettings::guided(guided_tick_ms),
            ExerciseMode::Free => TimerSettings::free(),
        }
    }

    pub fn timer(&self, guided_tick_ms: u64) -> PhaseTimer {
        PhaseTimer::new(
            self.phases.clone(),
            self.total_duration_secs,
            self.timer_settings(guided_tick_ms),
        )
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Inhale, hold and exhale seconds; a kind missing from the list counts as 0
    pub fn guided_timings(&self) -> [u32; 3] {
        [PhaseKind::Inhale, PhaseKind::HoldAfterInhale, PhaseKind::Exhale].map(|kind| {
            self.phases
                .iter()
                .find(|p| p.kind == kind)
                .map_or(0, |p| p.duration_secs)
        })
    }

    /// Timings summary such as `4-7-8`, counting enabled phases only
    pub fn pattern(&self) -> String {
        self.phases
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.duration_secs)
            .join("-")
    }

    pub fn cycle_duration_secs(&self) -> u64 {
        phase::cycle_duration_secs(&self.phases)
    }
}

/// Parses either a single record or an array of records
pub fn parse_records(json: &str) -> Result<Vec<ExerciseRecord>, ExerciseError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(ExerciseRecord),
        Many(Vec<ExerciseRecord>),
    }

    let records = match serde_json::from_str::<OneOrMany>(json)? {
        OneOrMany::One(record) => vec![record],
        OneOrMany::Many(records) => records,
    };

    if records.is_empty() {
        Err(ExerciseError::Empty)
    } else {
        Ok(records)
    }
}

pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<ExerciseRecord>, ExerciseError> {
    let json = fs::read_to_string(path)?;
    parse_records(&json)
}
