//! Configuration loading
//!
//! Layers, later ones win: built-in defaults, `<config_dir>/mirrormind/config.toml`,
//! an explicit config file, then `MIRRORMIND_*` environment variables. Nested keys
//! use a double underscore, e.g. `MIRRORMIND_THRESHOLDS__SMILE_APERTURE=0.04`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::LoopError;
use crate::perception::DetectionThresholds;
use crate::pipeline::DEFAULT_PATTERN_LABEL;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MIRRORMIND_";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// CSV file sessions are appended to
    pub log_path: PathBuf,
    /// Label written to the Pattern column
    pub pattern_label: String,
    /// Stop sessions after this many seconds; unlimited when absent
    pub max_duration_sec: Option<f64>,
    /// Rows shown in the dashboard's recent list
    pub recent_rows: usize,
    /// Landmark heuristic thresholds
    pub thresholds: DetectionThresholds,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            log_path: data_dir.join("loop_log.csv"),
            pattern_label: DEFAULT_PATTERN_LABEL.to_string(),
            max_duration_sec: None,
            recent_rows: 10,
            thresholds: DetectionThresholds::default(),
        }
    }
}

impl MirrorConfig {
    /// Load configuration from the default locations
    pub fn load() -> Result<Self, LoopError> {
        Self::load_from(None)
    }

    /// Load configuration, optionally merging a specific file
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, LoopError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(LoopError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Maximum session length, ignoring non-positive values
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_sec
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    fn validate(&self) -> Result<(), LoopError> {
        let t = &self.thresholds;
        if t.smile_aperture <= 0.0 || t.eye_closed_distance <= 0.0 || t.scroll_displacement <= 0.0
        {
            return Err(LoopError::Config(
                "detection thresholds must be positive".to_string(),
            ));
        }
        if t.scroll_repeats == 0 {
            return Err(LoopError::Config(
                "scroll_repeats must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Platform config directory for mirrormind (`~/.config/mirrormind` on Linux)
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("mirrormind"))
}

/// Platform data directory for mirrormind (`~/.local/share/mirrormind` on Linux)
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("mirrormind"))
}
