use std::time::{Duration, Instant};

/// A change of the current frame requested by input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCommand {
    /// Relative move, wrapped.
    Step(i64),
    /// Absolute position, wrapped.
    Jump(i64),
}

/// Lets at most one frame command through per interval. The window opens
/// when a command starts waiting; commands arriving inside it replace each
/// other and only the latest is released once the window has elapsed.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    /// Latest command and the time the first one of its window arrived.
    pending: Option<(FrameCommand, Instant)>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self { Self { interval, pending: None } }

    pub fn submit(&mut self, command: FrameCommand, now: Instant) {
        match &mut self.pending {
            Some((waiting, _)) => {
                tracing::trace!(dropped = ?waiting, ?command, "coalesced frame command");
                *waiting = command;
            }
            None => self.pending = Some((command, now)),
        }
    }

    pub fn has_pending(&self) -> bool { self.pending.is_some() }

    pub fn poll(&mut self, now: Instant) -> Option<FrameCommand> {
        let (command, since) = self.pending?;
        if now.saturating_duration_since(since) < self.interval {
            return None;
        }
        self.pending = None;
        Some(command)
    }

    pub fn clear(&mut self) { self.pending = None; }
}
