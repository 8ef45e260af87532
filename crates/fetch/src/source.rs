use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};

use crate::FetchError;

/// Frames never change once published, so they may be cached for a year.
pub const LONG_CACHE_CONTROL: &str = "max-age=31536000";

/// Where frame bytes come from. Called from worker threads only.
pub trait AssetSource: Send + Sync {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetches paths relative to a base URL.
pub struct HttpSource {
    base: String,
    client: Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(LONG_CACHE_CONTROL));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { base: base_url.into(), client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

impl AssetSource for HttpSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.url(path);
        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Serves frames from a local directory laid out like the asset host.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    fn file_path(&self, path: &str) -> PathBuf {
        // Query strings (cache busting) have no meaning on disk.
        let path = path.split('?').next().unwrap_or(path);
        self.root.join(path.trim_start_matches('/'))
    }
}

impl AssetSource for DirSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let file = self.file_path(path);
        std::fs::read(&file).map_err(|source| FetchError::Io { path: file, source })
    }
}
