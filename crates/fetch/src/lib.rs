//! Off-thread fetch and decode of sequence frames.
//!
//! The interactive side submits [`FetchRequest`]s through a [`FetchHandle`] and
//! drains [`FetchResponse`]s from the [`FetchWorker`]. Requests and replies are
//! plain serde values; nothing else crosses the thread boundary.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use sequence::{ResourceId, Tier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod source;
mod worker;

pub use source::{AssetSource, DirSource, HttpSource, LONG_CACHE_CONTROL};
pub use worker::{FetchHandle, FetchWorker};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to load image: {status} {reason}")]
    Status { status: u16, reason: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
#[error("failed to decode image: {0}")]
pub struct DecodeError(#[from] image::ImageError);

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("fetch worker stopped")]
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub id: ResourceId,
    /// Path actually fetched; differs from `id.path()` when cache-busted.
    pub path: String,
    pub is_low_res: bool,
}

impl FetchRequest {
    pub fn new(id: ResourceId) -> Self {
        let path = id.path().to_string();
        Self::with_path(id, path)
    }

    pub fn cache_busted(id: ResourceId, nonce: impl fmt::Display) -> Self {
        let path = id.cache_busted(nonce);
        Self::with_path(id, path)
    }

    fn with_path(id: ResourceId, path: String) -> Self {
        let is_low_res = id.tier() == Tier::Low;
        Self { id, path, is_low_res }
    }
}

/// Decoded RGBA8 image ready for upload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

pub fn decode(bytes: &[u8]) -> Result<Bitmap, DecodeError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Bitmap { width, height, pixels: Arc::from(rgba.into_raw().into_boxed_slice()) })
}

/// Exactly one reply is produced per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FetchResponse {
    Decoded { id: ResourceId, path: String, bitmap: Bitmap },
    /// Bytes arrived but could not be decoded; the caller renders `path` directly.
    Fetched { id: ResourceId, path: String },
    Failed { id: ResourceId, path: String, error: String },
}

impl FetchResponse {
    pub fn id(&self) -> &ResourceId {
        match self {
            FetchResponse::Decoded { id, .. }
            | FetchResponse::Fetched { id, .. }
            | FetchResponse::Failed { id, .. } => id,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FetchResponse::Decoded { path, .. }
            | FetchResponse::Fetched { path, .. }
            | FetchResponse::Failed { path, .. } => path,
        }
    }

    pub fn is_failure(&self) -> bool { matches!(self, FetchResponse::Failed { .. }) }
}
