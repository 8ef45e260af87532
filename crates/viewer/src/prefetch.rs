use sequence::{normalize, ConfigError, FrameNumber, Tier, ViewCatalog, ViewName, ViewerConfig};

use crate::cache::AssetCache;
use crate::input::Direction;

/// Warms high-res neighbors of the current frame, reaching further in the
/// direction the user last moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefetcher {
    radius: u32,
    bonus: u32,
}

impl Prefetcher {
    pub fn new(radius: u32, bonus: u32) -> Self { Self { radius, bonus } }

    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::new(config.preload_range, config.direction_bonus)
    }

    /// Frames to warm, from the furthest behind to the furthest ahead. The
    /// current frame and wrap duplicates are skipped.
    pub fn plan(&self, current: FrameNumber, direction: Direction, total: u32) -> Vec<FrameNumber> {
        let forward = i64::from(self.radius + if direction == Direction::Forward { self.bonus } else { 0 });
        let backward = i64::from(self.radius + if direction == Direction::Backward { self.bonus } else { 0 });
        let base = i64::from(current.get());
        let mut frames: Vec<FrameNumber> = Vec::new();
        for offset in -backward..=forward {
            if offset == 0 {
                continue;
            }
            let frame = normalize(base + offset, total);
            if frame != current && !frames.contains(&frame) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Warms every planned frame; returns how many fetches were issued.
    /// Frames already pending or cached cost nothing, so this is safe to
    /// call on every frame change.
    pub fn schedule(
        &self,
        catalog: &ViewCatalog,
        view: &ViewName,
        current: FrameNumber,
        direction: Direction,
        total: u32,
        cache: &mut AssetCache,
    ) -> Result<usize, ConfigError> {
        let mut issued = 0;
        for frame in self.plan(current, direction, total) {
            let id = catalog.resolve(view, frame, Tier::High)?;
            if cache.warm(&id) {
                issued += 1;
            }
        }
        if issued > 0 {
            tracing::debug!(%view, %current, ?direction, issued, "prefetch scheduled");
        }
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(list: &[FrameNumber]) -> Vec<u32> { list.iter().map(|f| f.get()).collect() }

    #[test]
    fn forward_drag_reaches_further_ahead() {
        let plan = Prefetcher::new(5, 3).plan(normalize(10, 140), Direction::Forward, 140);
        assert_eq!(frames(&plan), vec![5, 6, 7, 8, 9, 11, 12, 13, 14, 15, 16, 17, 18]);
    }

    #[test]
    fn backward_drag_wraps_below_one() {
        let plan = Prefetcher::new(5, 3).plan(normalize(2, 140), Direction::Backward, 140);
        assert_eq!(frames(&plan), vec![134, 135, 136, 137, 138, 139, 140, 1, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn no_direction_is_symmetric() {
        let plan = Prefetcher::new(5, 3).plan(normalize(140, 140), Direction::None, 140);
        assert_eq!(frames(&plan), vec![135, 136, 137, 138, 139, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn short_sequences_never_plan_the_current_frame_twice() {
        let plan = Prefetcher::new(5, 3).plan(normalize(2, 4), Direction::Forward, 4);
        assert_eq!(frames(&plan), vec![1, 3, 4]);
    }
}
