use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// 1-based position inside a sequence. Always within `[1, total]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameNumber(u32);

impl FrameNumber {
    pub const FIRST: FrameNumber = FrameNumber(1);

    pub fn get(self) -> u32 { self.0 }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Wraps any integer into `[1, total]`. `total` must be non-zero.
pub fn normalize(frame: i64, total: u32) -> FrameNumber {
    let total = i64::from(total.max(1));
    FrameNumber(((frame - 1).rem_euclid(total) + 1) as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIndex {
    current: FrameNumber,
    total: u32,
}

impl FrameIndex {
    pub fn new(total: u32) -> Result<Self, ConfigError> {
        if total == 0 {
            return Err(ConfigError::InvalidTotalFrames);
        }
        Ok(Self { current: FrameNumber::FIRST, total })
    }

    pub fn current(&self) -> FrameNumber { self.current }

    pub fn total(&self) -> u32 { self.total }

    /// Moves by `delta` frames in a single wrap, whatever its magnitude or sign.
    pub fn advance(&mut self, delta: i64) -> FrameNumber {
        self.current = normalize(i64::from(self.current.0) + delta, self.total);
        self.current
    }

    pub fn set(&mut self, frame: i64) -> FrameNumber {
        self.current = normalize(frame, self.total);
        self.current
    }
}

/// Frame index shared between the viewer core and the host application.
///
/// The host owns the value; the core reads it and writes through `set` or
/// `update`, so several consumers can observe the same position.
#[derive(Debug, Clone)]
pub struct SharedFrame(Arc<Mutex<FrameIndex>>);

impl SharedFrame {
    pub fn new(total: u32) -> Result<Self, ConfigError> {
        Ok(Self(Arc::new(Mutex::new(FrameIndex::new(total)?))))
    }

    pub fn current(&self) -> FrameNumber { self.0.lock().current() }

    pub fn total(&self) -> u32 { self.0.lock().total() }

    pub fn set(&self, frame: i64) -> FrameNumber { self.0.lock().set(frame) }

    pub fn advance(&self, delta: i64) -> FrameNumber { self.0.lock().advance(delta) }

    /// Updater form: `f` receives the current frame and returns the raw next value.
    pub fn update<F>(&self, f: F) -> FrameNumber
    where
        F: FnOnce(FrameNumber) -> i64,
    {
        let mut index = self.0.lock();
        let next = f(index.current());
        index.set(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_stays_in_range_for_any_delta() {
        for start in 1..=140i64 {
            for delta in [-1000i64, -281, -140, -141, -1, 0, 1, 139, 140, 141, 999, i32::MAX as i64] {
                let mut index = FrameIndex::new(140).unwrap();
                index.set(start);
                let got = index.advance(delta).get() as i64;
                assert!((1..=140).contains(&got), "start={start} delta={delta} got={got}");
                assert_eq!((got - 1).rem_euclid(140), (start + delta - 1).rem_euclid(140));
            }
        }
    }

    #[test]
    fn set_wraps_zero_and_negatives() {
        let mut index = FrameIndex::new(140).unwrap();
        assert_eq!(index.set(0).get(), 140);
        assert_eq!(index.set(-1).get(), 139);
        assert_eq!(index.set(141).get(), 1);
        assert_eq!(index.set(280).get(), 140);
        assert_eq!(index.set(-140).get(), 140);
    }

    #[test]
    fn zero_total_is_rejected() {
        assert!(matches!(FrameIndex::new(0), Err(ConfigError::InvalidTotalFrames)));
    }

    #[test]
    fn shared_frame_updater_normalizes() {
        let shared = SharedFrame::new(140).unwrap();
        let observer = shared.clone();
        shared.set(3);
        let next = shared.update(|prev| i64::from(prev.get()) - 5);
        assert_eq!(next.get(), 138);
        assert_eq!(observer.current().get(), 138);
    }
}
