//! Runtime of the image-sequence viewer: input handling, progressive loading,
//! prefetch and the observable state a presentation layer renders.

use thiserror::Error;

pub mod cache;
pub mod controller;
pub mod input;
pub mod persist;
pub mod prefetch;
pub mod session;
pub mod state;
pub mod throttle;

pub use cache::{AssetCache, CacheEntry, CacheStats, ImageHandle, Outcome, Resolution};
pub use controller::ViewerController;
pub use input::{Direction, InputController, InputEffect, InputEvent, Key};
pub use persist::{frame_set_key, PersistedFrameSet, GUIDE_KEY};
pub use prefetch::Prefetcher;
pub use session::{critical_frames, Carryover, ViewerSession};
pub use state::{reduce, LoadPhase, ViewerAction, ViewerState};
pub use throttle::{FrameCommand, RateLimiter};

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Config(#[from] sequence::ConfigError),
    #[error("no active view")]
    NoActiveView,
}
