use include_dir::{include_dir, Dir};
use itertools::Itertools;
use tracing::warn;

use crate::error::ExerciseError;
use crate::exercise::{parse_records, Exercise, ExerciseRecord};

static PRESET_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/presets");

/// Built-in exercise, addressed by the stem of its file name
#[derive(Debug, Clone)]
pub struct Preset {
    pub slug: String,
    pub record: ExerciseRecord,
}

impl Preset {
    pub fn exercise(&self) -> Exercise {
        Exercise::from(&self.record)
    }
}

pub const DEFAULT_PRESET: &str = "coherence";

pub fn builtin_presets() -> Vec<Preset> {
    PRESET_DIR
        .files()
        .filter(|f| f.path().extension().is_some_and(|ext| ext == "json"))
        .filter_map(|f| {
            let slug = f.path().file_stem()?.to_string_lossy().into_owned();
            let json = f.contents_utf8()?;
            match parse_records(json) {
                Ok(mut records) => Some(Preset {
                    slug,
                    record: records.swap_remove(0),
                }),
                Err(e) => {
                    warn!(preset = %slug, error = %e, "skipping unreadable preset");
                    None
                }
            }
        })
        .sorted_by(|a, b| a.slug.cmp(&b.slug))
        .collect()
}

pub fn find_preset(slug: &str) -> Result<Exercise, ExerciseError> {
    builtin_presets()
        .into_iter()
        .find(|p| p.slug.eq_ignore_ascii_case(slug))
        .map(|p| p.exercise())
        .ok_or_else(|| ExerciseError::UnknownPreset(slug.to_string()))
}
