use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::time::Instant;

use crossbeam_channel::Receiver;
use fetch::{FetchHandle, FetchResponse};
use sequence::{
    normalize, ConfigError, DeviceKind, FrameNumber, ResourceId, SharedFrame, Tier, ViewCatalog,
    ViewName, ViewerConfig,
};
use uuid::Uuid;

use crate::cache::{AssetCache, CacheEntry, CacheStats, ImageHandle, Outcome};
use crate::input::{InputController, InputEffect, InputEvent};
use crate::persist::PersistedFrameSet;
use crate::prefetch::Prefetcher;
use crate::state::{reduce, LoadPhase, ViewerAction, ViewerState};
use crate::throttle::FrameCommand;

/// Frames sampled to decide that the viewer has loaded once: the first, the
/// quarters and the last.
pub fn critical_frames(total: u32) -> BTreeSet<FrameNumber> {
    let n = f64::from(total);
    [1.0, 0.25 * n, 0.5 * n, 0.75 * n, n]
        .into_iter()
        .map(|frame| normalize(frame.round() as i64, total))
        .collect()
}

/// Carried from one activation to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Carryover {
    pub zoom: f32,
    pub show_guide: bool,
    pub first_load_complete: bool,
}

/// Everything that lives for one activation of one view. Dropping it stops
/// the frame clock and cancels momentum.
pub struct ViewerSession {
    id: Uuid,
    view: ViewName,
    catalog: ViewCatalog,
    total: u32,
    frame: SharedFrame,
    cache: AssetCache,
    input: InputController,
    prefetcher: Prefetcher,
    state: ViewerState,
    actions: VecDeque<ViewerAction>,
    /// Critical frames whose high-res attempt has not settled yet.
    critical: BTreeSet<FrameNumber>,
    current_high: ResourceId,
    current_low: ResourceId,
    ticker: Receiver<Instant>,
}

impl ViewerSession {
    pub fn start(
        config: &ViewerConfig,
        view: ViewName,
        frame: SharedFrame,
        fetcher: FetchHandle,
        snapshot: &PersistedFrameSet,
        carry: Carryover,
    ) -> Result<Self, ConfigError> {
        let catalog = config.views.clone();
        let total = frame.total();
        let current = frame.current();
        let current_high = catalog.resolve(&view, current, Tier::High)?;
        let current_low = catalog.resolve(&view, current, Tier::Low)?;

        let mut cache = AssetCache::new(view.clone(), fetcher);
        cache.load_snapshot(snapshot);
        let mut input = InputController::new(config);
        let zoom = input.set_zoom(carry.zoom);
        let mut state = ViewerState::new(current, total, zoom, carry.show_guide);
        state.first_load_complete = carry.first_load_complete;

        let mut session = Self {
            id: Uuid::new_v4(),
            view,
            catalog,
            total,
            frame,
            cache,
            input,
            prefetcher: Prefetcher::from_config(config),
            state,
            actions: VecDeque::new(),
            critical: BTreeSet::new(),
            current_high,
            current_low,
            ticker: crossbeam_channel::tick(config.frame_interval()),
        };
        tracing::info!(
            session = %session.id,
            view = %session.view,
            frame = %current,
            candidates = snapshot.len(),
            "viewer session started"
        );

        session.show_frame(current)?;
        if !session.state.first_load_complete {
            session.preload_critical()?;
        }
        session.flush();
        Ok(session)
    }

    pub fn id(&self) -> Uuid { self.id }

    pub fn view(&self) -> &ViewName { &self.view }

    pub fn state(&self) -> ViewerState { self.state }

    pub fn phase(&self) -> LoadPhase { self.state.phase() }

    pub fn cache(&self) -> &AssetCache { &self.cache }

    pub fn input(&self) -> &InputController { &self.input }

    pub fn set_device(&mut self, device: DeviceKind) { self.input.set_device(device); }

    pub fn handle_input(&mut self, event: InputEvent, now: Instant) {
        for effect in self.input.handle(event, now) {
            match effect {
                InputEffect::Dragging(dragging) => self.dispatch(ViewerAction::SetDragging(dragging)),
                InputEffect::Zoom(zoom) => self.dispatch(ViewerAction::SetZoom(zoom)),
                // Applied by the next due tick.
                InputEffect::Frame(_) => {}
            }
        }
        self.flush();
    }

    /// One step of the frame clock: momentum, the coalesced frame command,
    /// then any change the host made to the shared frame.
    pub fn tick_at(&mut self, now: Instant) -> Result<(), ConfigError> {
        if let Some(command) = self.input.tick(now) {
            let applied = match command {
                FrameCommand::Step(delta) => self.frame.advance(delta),
                FrameCommand::Jump(frame) => self.frame.set(frame),
            };
            tracing::trace!(?command, frame = %applied, "frame command applied");
        }
        let current = self.frame.current();
        if current != self.current_high.frame() {
            self.show_frame(current)?;
        }
        self.flush();
        Ok(())
    }

    /// Runs a tick if the frame clock fired since the last call. Never blocks.
    pub fn pump(&mut self) -> Result<(), ConfigError> {
        match self.ticker.try_iter().last() {
            Some(now) => self.tick_at(now),
            None => Ok(()),
        }
    }

    /// Reconciles one worker reply with the cache and the visible state.
    pub fn apply(&mut self, reply: FetchResponse) {
        let Some(resolution) = self.cache.apply(reply) else { return };
        let id = resolution.id;

        if id == self.current_high {
            match &resolution.outcome {
                Outcome::Failed(error) => {
                    tracing::warn!(session = %self.id, path = id.path(), %error, "current frame failed");
                    self.dispatch(ViewerAction::ImageError);
                }
                _ => self.dispatch(ViewerAction::ImageLoaded),
            }
        } else if id == self.current_low {
            if resolution.outcome.is_success() {
                self.dispatch(ViewerAction::LowResLoaded);
            }
        } else if let Outcome::Failed(error) = &resolution.outcome {
            tracing::debug!(path = id.path(), %error, "prefetch failed");
        }

        if id.tier() == Tier::High && self.critical.remove(&id.frame()) {
            self.check_first_load();
        }
        self.flush();
    }

    /// Re-requests the current frame past any intermediate cache. Only acts in
    /// the error phase; returns whether a retry was issued.
    pub fn retry(&mut self, nonce: impl fmt::Display) -> bool {
        if self.state.phase() != LoadPhase::Error {
            return false;
        }
        let id = self.current_high.clone();
        tracing::info!(session = %self.id, path = id.path(), %nonce, "retrying current frame");
        self.dispatch(ViewerAction::ImageLoading);
        self.cache.remove(&id);
        self.cache.warm_busted(&id, nonce);
        if matches!(self.cache.peek(&id), Some(CacheEntry::Error(_))) {
            self.dispatch(ViewerAction::ImageError);
        }
        self.flush();
        true
    }

    pub fn hide_guide(&mut self) {
        self.dispatch(ViewerAction::HideGuide);
        self.flush();
    }

    /// The image to draw: the high-res frame once loaded, else the low-res
    /// preview while it is visible.
    pub fn current_image(&self) -> Option<&ImageHandle> {
        let loaded = |id: &ResourceId| match self.cache.peek(id) {
            Some(CacheEntry::Loaded(handle)) => Some(handle),
            _ => None,
        };
        if self.state.image_loaded {
            return loaded(&self.current_high);
        }
        if self.state.low_res_visible {
            return loaded(&self.current_low);
        }
        None
    }

    pub fn stats(&self) -> CacheStats { self.cache.stats() }

    /// Ends the session and returns what should be remembered for the view.
    pub fn teardown(self, cap: usize) -> PersistedFrameSet {
        let snapshot = self.cache.persist_snapshot(cap);
        tracing::info!(
            session = %self.id,
            view = %self.view,
            entries = self.cache.len(),
            persisted = snapshot.len(),
            stats = %self.cache.stats(),
            "viewer session ended"
        );
        snapshot
    }

    fn show_frame(&mut self, current: FrameNumber) -> Result<(), ConfigError> {
        self.current_high = self.catalog.resolve(&self.view, current, Tier::High)?;
        self.current_low = self.catalog.resolve(&self.view, current, Tier::Low)?;
        self.dispatch(ViewerAction::SetFrame(current));
        self.dispatch(ViewerAction::ImageLoading);

        let high = self.current_high.clone();
        let low = self.current_low.clone();
        self.cache.warm(&low);
        self.cache.warm(&high);
        if matches!(self.cache.get(&low), Some(CacheEntry::Loaded(_))) {
            self.dispatch(ViewerAction::LowResLoaded);
        }
        let settled = match self.cache.get(&high) {
            Some(CacheEntry::Loaded(_)) => Some(ViewerAction::ImageLoaded),
            Some(CacheEntry::Error(_)) => Some(ViewerAction::ImageError),
            _ => None,
        };
        if let Some(action) = settled {
            self.dispatch(action);
        }

        self.prefetcher.schedule(
            &self.catalog,
            &self.view,
            current,
            self.input.last_direction(),
            self.total,
            &mut self.cache,
        )?;
        Ok(())
    }

    fn preload_critical(&mut self) -> Result<(), ConfigError> {
        for frame in critical_frames(self.total) {
            let high = self.catalog.resolve(&self.view, frame, Tier::High)?;
            let settled = match self.cache.peek(&high) {
                Some(entry) => entry.is_settled(),
                None => self.cache.is_known(&high),
            };
            if settled {
                continue;
            }
            let low = self.catalog.resolve(&self.view, frame, Tier::Low)?;
            self.cache.warm(&high);
            self.cache.warm(&low);
            if !matches!(self.cache.peek(&high), Some(entry) if entry.is_settled()) {
                self.critical.insert(frame);
            }
        }
        tracing::debug!(session = %self.id, pending = self.critical.len(), "critical preload started");
        self.check_first_load();
        Ok(())
    }

    fn check_first_load(&mut self) {
        if self.critical.is_empty() && !self.state.first_load_complete {
            tracing::info!(session = %self.id, view = %self.view, "first load complete");
            self.dispatch(ViewerAction::FirstLoadComplete);
        }
    }

    fn dispatch(&mut self, action: ViewerAction) { self.actions.push_back(action); }

    fn flush(&mut self) {
        while let Some(action) = self.actions.pop_front() {
            self.state = reduce(self.state, action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_frames_sample_quarters() {
        let frames: Vec<u32> = critical_frames(140).into_iter().map(FrameNumber::get).collect();
        assert_eq!(frames, vec![1, 35, 70, 105, 140]);
    }

    #[test]
    fn critical_frames_collapse_on_short_sequences() {
        let frames: Vec<u32> = critical_frames(2).into_iter().map(FrameNumber::get).collect();
        assert_eq!(frames, vec![1, 2]);
    }
}
