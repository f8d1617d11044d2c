use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::phase::{default_free_phases, Phase, FREE_PHASE_DURATION_SECS};
use crate::presets::DEFAULT_PRESET;
use crate::session::{GUIDED_TICK_MS, GUIDED_TICK_RANGE_MS};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Phase list of the free exercise, as last left in the editor
    pub free_phases: Vec<Phase>,
    pub guided_tick_ms: u64,
    pub default_preset: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            free_phases: default_free_phases(),
            guided_tick_ms: GUIDED_TICK_MS,
            default_preset: DEFAULT_PRESET.to_string(),
        }
    }
}

impl Config {
    /// Brings hand-edited values back into the ranges the player accepts
    pub fn sanitized(mut self) -> Self {
        if !GUIDED_TICK_RANGE_MS.contains(&self.guided_tick_ms) {
            let tick = self
                .guided_tick_ms
                .clamp(*GUIDED_TICK_RANGE_MS.start(), *GUIDED_TICK_RANGE_MS.end());
            warn!(configured = self.guided_tick_ms, using = tick, "guided tick out of range");
            self.guided_tick_ms = tick;
        }

        if self.free_phases.is_empty() {
            warn!("no free phases configured, using the defaults");
            self.free_phases = default_free_phases();
        }
        for phase in &mut self.free_phases {
            if !FREE_PHASE_DURATION_SECS.contains(&phase.duration_secs) {
                let secs = phase
                    .duration_secs
                    .clamp(*FREE_PHASE_DURATION_SECS.start(), *FREE_PHASE_DURATION_SECS.end());
                warn!(phase = %phase.kind, configured = phase.duration_secs, using = secs, "free phase duration out of range");
                phase.duration_secs = secs;
            }
        }
        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("cesizen_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg.sanitized(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
