use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::ViewCatalog;
use crate::ConfigError;

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "TURNTABLE_CONFIG";

/// Input device class; touch screens get a finer drag threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Pointer,
    Touch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub initial: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self { initial: 1.7, min: 0.5, max: 5.0, step: 0.1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub total_frames: u32,
    /// Pixels of horizontal drag per frame. Higher is less sensitive.
    pub drag_sensitivity: f32,
    pub touch_factor: f32,
    pub device: DeviceKind,
    /// Neighbors warmed on each side of the current frame.
    pub preload_range: u32,
    /// Extra neighbors warmed in the last drag direction.
    pub direction_bonus: u32,
    pub enable_momentum: bool,
    pub momentum_scale: f32,
    pub momentum_decay: f32,
    pub momentum_threshold: f32,
    pub frame_interval_ms: u64,
    /// Entries written to the persisted frame set per view.
    pub persisted_cap: usize,
    pub fetch_workers: usize,
    pub zoom: ZoomConfig,
    pub views: ViewCatalog,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            total_frames: 140,
            drag_sensitivity: 15.0,
            touch_factor: 0.7,
            device: DeviceKind::Pointer,
            preload_range: 5,
            direction_bonus: 3,
            enable_momentum: false,
            momentum_scale: 5.0,
            momentum_decay: 0.95,
            momentum_threshold: 0.1,
            frame_interval_ms: 16,
            persisted_cap: 50,
            fetch_workers: 4,
            zoom: ZoomConfig::default(),
            views: ViewCatalog::default(),
        }
    }
}

impl ViewerConfig {
    /// Default config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        if let Some(raw) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(raw));
        }
        dirs::config_dir().map(|d| d.join("turntable").join("config.json"))
    }

    /// Loads and validates the config. A missing file yields the defaults; an
    /// unreadable or invalid one is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_path(&path)?,
            _ => {
                tracing::debug!("no viewer config file, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_frames == 0 {
            return Err(ConfigError::InvalidTotalFrames);
        }
        if !(self.drag_sensitivity > 0.0) {
            return Err(invalid("drag_sensitivity", "must be positive"));
        }
        if !(self.touch_factor > 0.0 && self.touch_factor <= 1.0) {
            return Err(invalid("touch_factor", "must be within (0, 1]"));
        }
        if !(self.momentum_decay > 0.0 && self.momentum_decay < 1.0) {
            return Err(invalid("momentum_decay", "must be within (0, 1)"));
        }
        if self.frame_interval_ms == 0 {
            return Err(invalid("frame_interval_ms", "must be positive"));
        }
        if self.fetch_workers == 0 {
            return Err(invalid("fetch_workers", "must be positive"));
        }
        let zoom = &self.zoom;
        if !(zoom.min > 0.0 && zoom.min <= zoom.initial && zoom.initial <= zoom.max) {
            return Err(invalid("zoom", "expected 0 < min <= initial <= max"));
        }
        self.views.validate()
    }

    pub fn effective_sensitivity(&self) -> f32 {
        match self.device {
            DeviceKind::Pointer => self.drag_sensitivity,
            DeviceKind::Touch => self.drag_sensitivity * self.touch_factor,
        }
    }

    pub fn frame_interval(&self) -> Duration { Duration::from_millis(self.frame_interval_ms) }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting { name, reason: reason.to_string() }
}
