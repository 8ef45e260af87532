#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fetch::{AssetSource, FetchError};
use parking_lot::Mutex;
use sequence::{SharedFrame, ViewerConfig};
use store::MemoryStore;
use viewer::{ViewerController, ViewerState};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory asset host. Serves a tiny PNG for every path unless told to
/// fail it or to serve bytes nothing can decode.
#[derive(Default)]
pub struct FakeSource {
    pub seen: Mutex<Vec<String>>,
    /// Base paths that fail until requested with a cache-busting query.
    pub failing: Mutex<HashSet<String>>,
    pub undecodable: bool,
}

impl FakeSource {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn undecodable() -> Arc<Self> { Arc::new(Self { undecodable: true, ..Self::default() }) }

    pub fn failing(paths: &[&str]) -> Arc<Self> {
        let source = Self::default();
        source.failing.lock().extend(paths.iter().map(|p| p.to_string()));
        Arc::new(source)
    }

    pub fn requested(&self, path: &str) -> bool { self.seen.lock().iter().any(|p| p == path) }

    pub fn requested_prefix(&self, prefix: &str) -> Vec<String> {
        self.seen.lock().iter().filter(|p| p.starts_with(prefix)).cloned().collect()
    }
}

impl AssetSource for FakeSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.seen.lock().push(path.to_string());
        if !path.contains("?retry=") && self.failing.lock().contains(path) {
            return Err(FetchError::Status { status: 404, reason: "Not Found".into() });
        }
        if self.undecodable {
            return Ok(b"RIFF....WEBPVP8 truncated".to_vec());
        }
        Ok(png_bytes())
    }
}

pub fn png_bytes() -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 40, 40, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    bytes
}

pub fn controller(store: &MemoryStore, source: Arc<FakeSource>) -> ViewerController {
    init_tracing();
    let config = ViewerConfig { fetch_workers: 2, ..ViewerConfig::default() };
    let frame = SharedFrame::new(config.total_frames).expect("frame index");
    ViewerController::new(config, frame, Box::new(store.clone()), source).expect("controller")
}

/// Pumps until `done` holds for the visible state or five seconds pass.
pub fn pump_until(controller: &mut ViewerController, done: impl Fn(&ViewerState) -> bool) -> ViewerState {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        controller.pump().expect("pump");
        let state = controller.state().expect("active view");
        if done(&state) {
            return state;
        }
        assert!(Instant::now() < deadline, "timed out waiting, last state: {:?}", state);
        thread::sleep(Duration::from_millis(2));
    }
}
