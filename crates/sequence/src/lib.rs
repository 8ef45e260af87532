//! Frame numbering, view catalogs and resource addressing for image sequences.
//!
//! Everything here is pure data: no I/O except reading the optional config
//! file. The `viewer` crate builds its runtime on top of these types.

use std::path::PathBuf;

use thiserror::Error;

pub mod catalog;
pub mod config;
pub mod frame;

pub use catalog::{ResourceId, Tier, ViewCatalog, ViewName, ViewTemplates, FRAME_PLACEHOLDER};
pub use config::{DeviceKind, ViewerConfig, ZoomConfig};
pub use frame::{normalize, FrameIndex, FrameNumber, SharedFrame};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown view: {0}")]
    UnknownView(String),
    #[error("view {view}: {tier} template is missing the {{frame}} placeholder")]
    MissingPlaceholder { view: String, tier: Tier },
    #[error("no views configured")]
    NoViews,
    #[error("total frame count must be positive")]
    InvalidTotalFrames,
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
