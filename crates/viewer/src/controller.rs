use std::sync::Arc;
use std::time::Instant;

use fetch::{AssetSource, FetchWorker};
use sequence::{ConfigError, DeviceKind, SharedFrame, ViewName, ViewerConfig};
use store::KeyValueStore;

use crate::cache::ImageHandle;
use crate::input::InputEvent;
use crate::persist::{guide_dismissed, load_frame_set, mark_guide_dismissed, save_frame_set};
use crate::session::{Carryover, ViewerSession};
use crate::state::ViewerState;
use crate::ViewerError;

/// Entry point for a host: owns the fetch worker and the store, and keeps at
/// most one [`ViewerSession`] alive for the active view.
///
/// The host drives it from its interactive thread: input through
/// [`handle_input`](Self::handle_input), time through [`pump`](Self::pump) or
/// [`tick_at`](Self::tick_at). Nothing here blocks.
pub struct ViewerController {
    config: ViewerConfig,
    frame: SharedFrame,
    store: Box<dyn KeyValueStore>,
    worker: FetchWorker,
    session: Option<ViewerSession>,
    carry: Carryover,
}

impl ViewerController {
    pub fn new(
        config: ViewerConfig,
        frame: SharedFrame,
        store: Box<dyn KeyValueStore>,
        source: Arc<dyn AssetSource>,
    ) -> Result<Self, ViewerError> {
        config.validate()?;
        if frame.total() != config.total_frames {
            return Err(ConfigError::InvalidSetting {
                name: "total_frames",
                reason: format!(
                    "shared frame index has {} frames, config has {}",
                    frame.total(),
                    config.total_frames
                ),
            }
            .into());
        }
        let show_guide = !guide_dismissed(store.as_ref());
        let worker = FetchWorker::start(config.fetch_workers, source);
        let carry = Carryover { zoom: config.zoom.initial, show_guide, first_load_complete: false };
        Ok(Self { config, frame, store, worker, session: None, carry })
    }

    pub fn config(&self) -> &ViewerConfig { &self.config }

    pub fn frame(&self) -> &SharedFrame { &self.frame }

    pub fn active_view(&self) -> Option<&ViewName> { self.session.as_ref().map(|s| s.view()) }

    pub fn session(&self) -> Option<&ViewerSession> { self.session.as_ref() }

    /// Switches to `view`, ending the current session first. An unknown view
    /// leaves the controller without a session.
    pub fn activate(&mut self, view: &str) -> Result<(), ViewerError> {
        self.deactivate();
        let view = self.config.views.view(view)?;
        let snapshot = load_frame_set(self.store.as_ref(), &view);
        let session = ViewerSession::start(
            &self.config,
            view,
            self.frame.clone(),
            self.worker.handle(),
            &snapshot,
            self.carry,
        )?;
        self.session = Some(session);
        Ok(())
    }

    /// Ends the active session, if any, and persists its frame set.
    pub fn deactivate(&mut self) {
        let Some(session) = self.session.take() else { return };
        let state = session.state();
        self.carry.zoom = state.zoom_level;
        self.carry.first_load_complete = state.first_load_complete;
        let view = session.view().clone();
        let snapshot = session.teardown(self.config.persisted_cap);
        save_frame_set(self.store.as_ref(), &view, &snapshot);
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Result<(), ViewerError> {
        self.handle_input_at(event, Instant::now())
    }

    pub fn handle_input_at(&mut self, event: InputEvent, now: Instant) -> Result<(), ViewerError> {
        self.session_mut()?.handle_input(event, now);
        Ok(())
    }

    /// Drains worker replies, then runs one frame-clock step at `now`.
    pub fn tick_at(&mut self, now: Instant) -> Result<(), ViewerError> {
        self.drain_replies();
        self.session_mut()?.tick_at(now)?;
        Ok(())
    }

    /// Drains worker replies and runs a frame-clock step if one is due.
    pub fn pump(&mut self) -> Result<(), ViewerError> {
        self.drain_replies();
        self.session_mut()?.pump()?;
        Ok(())
    }

    /// Applies every reply that has arrived. Replies with no session to take
    /// them are dropped.
    pub fn drain_replies(&mut self) -> usize {
        let replies = self.worker.drain();
        let count = replies.len();
        match self.session.as_mut() {
            Some(session) => replies.into_iter().for_each(|reply| session.apply(reply)),
            None if count > 0 => tracing::debug!(count, "dropping replies without an active view"),
            None => {}
        }
        count
    }

    /// Retries the current frame if it failed. The nonce is the wall-clock
    /// time in milliseconds.
    pub fn retry(&mut self) -> Result<bool, ViewerError> {
        let nonce = chrono::Utc::now().timestamp_millis();
        Ok(self.session_mut()?.retry(nonce))
    }

    pub fn dismiss_guide(&mut self) {
        self.carry.show_guide = false;
        if let Some(session) = self.session.as_mut() {
            session.hide_guide();
        }
        mark_guide_dismissed(self.store.as_ref());
    }

    pub fn state(&self) -> Option<ViewerState> { self.session.as_ref().map(|s| s.state()) }

    pub fn current_image(&self) -> Option<ImageHandle> {
        self.session.as_ref().and_then(|s| s.current_image()).cloned()
    }

    pub fn set_device(&mut self, device: DeviceKind) {
        self.config.device = device;
        if let Some(session) = self.session.as_mut() {
            session.set_device(device);
        }
    }

    fn session_mut(&mut self) -> Result<&mut ViewerSession, ViewerError> {
        self.session.as_mut().ok_or(ViewerError::NoActiveView)
    }
}

impl Drop for ViewerController {
    fn drop(&mut self) { self.deactivate(); }
}
