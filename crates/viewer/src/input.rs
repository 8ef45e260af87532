use std::time::{Duration, Instant};

use sequence::{DeviceKind, ViewerConfig, ZoomConfig};

use crate::throttle::{FrameCommand, RateLimiter};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Key { ArrowLeft, ArrowRight, ArrowUp, ArrowDown }

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum InputEvent {
    DragStart { x: f32, y: f32 },
    DragMove { x: f32, y: f32 },
    DragEnd,
    /// Pointer left the surface; ends any drag like a normal release.
    PointerLeave,
    Wheel { delta_y: f32 },
    /// Absolute pinch scale.
    Pinch { scale: f32 },
    Key(Key),
    ZoomIn,
    ZoomOut,
    /// Slider position.
    Seek { frame: i64 },
}

/// Last direction of travel through the sequence.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Direction {
    Backward,
    #[default]
    None,
    Forward,
}

impl Direction {
    pub fn from_delta(delta: i64) -> Self {
        match delta.signum() {
            1 => Direction::Forward,
            -1 => Direction::Backward,
            _ => Direction::None,
        }
    }
}

/// Observable effect of one input event.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum InputEffect {
    /// Emitted into the rate limiter; applied on a later tick.
    Frame(FrameCommand),
    Zoom(f32),
    Dragging(bool),
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct DragSample {
    pub x: f32,
    pub y: f32,
    pub at: Instant,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum DragState {
    Idle,
    Dragging {
        /// Position at the last emitted command.
        baseline: DragSample,
        last_move: Instant,
        /// Pixels per millisecond at the last move.
        velocity: f32,
    },
}

#[derive(Clone, Copy, PartialEq, Debug)]
struct Momentum {
    value: f32,
    last_step: Instant,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Zoom {
    level: f32,
    min: f32,
    max: f32,
    step: f32,
}

impl Zoom {
    pub fn new(config: &ZoomConfig) -> Self {
        Self { level: config.initial, min: config.min, max: config.max, step: config.step }
    }

    pub fn level(&self) -> f32 { self.level }

    pub fn set(&mut self, level: f32) -> f32 {
        self.level = level.clamp(self.min, self.max);
        self.level
    }

    pub fn nudge(&mut self, steps: f32) -> f32 { self.set(self.level + steps * self.step) }
}

/// Turns raw pointer, wheel and key events into frame commands and zoom
/// changes.
pub struct InputController {
    base_sensitivity: f32,
    touch_factor: f32,
    sensitivity: f32,
    enable_momentum: bool,
    momentum_scale: f32,
    momentum_decay: f32,
    momentum_threshold: f32,
    interval: Duration,
    drag: DragState,
    momentum: Option<Momentum>,
    zoom: Zoom,
    direction: Direction,
    limiter: RateLimiter,
}

impl InputController {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            base_sensitivity: config.drag_sensitivity,
            touch_factor: config.touch_factor,
            sensitivity: config.effective_sensitivity(),
            enable_momentum: config.enable_momentum,
            momentum_scale: config.momentum_scale,
            momentum_decay: config.momentum_decay,
            momentum_threshold: config.momentum_threshold,
            interval: config.frame_interval(),
            drag: DragState::Idle,
            momentum: None,
            zoom: Zoom::new(&config.zoom),
            direction: Direction::None,
            limiter: RateLimiter::new(config.frame_interval()),
        }
    }

    pub fn set_device(&mut self, device: DeviceKind) {
        self.sensitivity = match device {
            DeviceKind::Pointer => self.base_sensitivity,
            DeviceKind::Touch => self.base_sensitivity * self.touch_factor,
        };
    }

    pub fn sensitivity(&self) -> f32 { self.sensitivity }

    pub fn is_dragging(&self) -> bool { matches!(self.drag, DragState::Dragging { .. }) }

    pub fn drag_state(&self) -> DragState { self.drag }

    pub fn last_direction(&self) -> Direction { self.direction }

    pub fn zoom(&self) -> f32 { self.zoom.level() }

    pub fn set_zoom(&mut self, level: f32) -> f32 { self.zoom.set(level) }

    pub fn momentum(&self) -> f32 { self.momentum.map_or(0.0, |m| m.value) }

    pub fn has_momentum(&self) -> bool { self.momentum.is_some() }

    pub fn has_pending_command(&self) -> bool { self.limiter.has_pending() }

    /// Drops drag, momentum and queued commands. Zoom and direction survive.
    pub fn reset(&mut self) {
        self.drag = DragState::Idle;
        self.momentum = None;
        self.limiter.clear();
    }

    pub fn handle(&mut self, event: InputEvent, now: Instant) -> Vec<InputEffect> {
        let mut effects = Vec::new();
        match event {
            InputEvent::DragStart { x, y } => {
                self.momentum = None;
                self.drag = DragState::Dragging {
                    baseline: DragSample { x, y, at: now },
                    last_move: now,
                    velocity: 0.0,
                };
                effects.push(InputEffect::Dragging(true));
            }
            InputEvent::DragMove { x, y } => {
                if let Some(command) = self.drag_move(x, y, now) {
                    effects.push(InputEffect::Frame(command));
                }
            }
            InputEvent::DragEnd | InputEvent::PointerLeave => {
                if self.release(now) {
                    effects.push(InputEffect::Dragging(false));
                }
            }
            InputEvent::Wheel { delta_y } => {
                if delta_y != 0.0 {
                    let steps = if delta_y < 0.0 { 1.0 } else { -1.0 };
                    effects.push(InputEffect::Zoom(self.zoom.nudge(steps)));
                }
            }
            InputEvent::Pinch { scale } => effects.push(InputEffect::Zoom(self.zoom.set(scale))),
            InputEvent::Key(Key::ArrowUp) | InputEvent::ZoomIn => {
                effects.push(InputEffect::Zoom(self.zoom.nudge(1.0)))
            }
            InputEvent::Key(Key::ArrowDown) | InputEvent::ZoomOut => {
                effects.push(InputEffect::Zoom(self.zoom.nudge(-1.0)))
            }
            InputEvent::Key(Key::ArrowLeft) => effects.push(InputEffect::Frame(self.emit_step(-1, now))),
            InputEvent::Key(Key::ArrowRight) => effects.push(InputEffect::Frame(self.emit_step(1, now))),
            InputEvent::Seek { frame } => {
                let command = FrameCommand::Jump(frame);
                self.limiter.submit(command, now);
                effects.push(InputEffect::Frame(command));
            }
        }
        effects
    }

    /// Releases the pending command once its window has elapsed, else the
    /// next momentum step when one is due. Momentum is paced by its own
    /// interval and does not wait in the limiter.
    pub fn tick(&mut self, now: Instant) -> Option<FrameCommand> {
        let drift = self.step_momentum(now);
        self.limiter.poll(now).or(drift)
    }

    fn drag_move(&mut self, x: f32, y: f32, now: Instant) -> Option<FrameCommand> {
        let DragState::Dragging { baseline, last_move, velocity } = &mut self.drag else {
            return None;
        };
        let delta_x = x - baseline.x;
        let elapsed_ms = now.saturating_duration_since(*last_move).as_secs_f32() * 1000.0;
        if elapsed_ms > 0.0 {
            *velocity = delta_x / elapsed_ms;
        }
        *last_move = now;

        if delta_x.abs() < self.sensitivity {
            return None;
        }
        let frames = (delta_x.abs() / self.sensitivity).floor() as i64;
        if frames == 0 {
            return None;
        }
        *baseline = DragSample { x, y, at: now };
        // Dragging right turns the object towards earlier frames.
        let delta = if delta_x > 0.0 { -frames } else { frames };
        Some(self.emit_step(delta, now))
    }

    /// Returns whether a drag was actually in progress.
    fn release(&mut self, now: Instant) -> bool {
        let DragState::Dragging { velocity, .. } = self.drag else {
            return false;
        };
        self.drag = DragState::Idle;
        self.momentum = None;
        if self.enable_momentum {
            let value = velocity * self.momentum_scale;
            if value.abs() >= self.momentum_threshold {
                self.momentum = Some(Momentum { value, last_step: now });
            }
        }
        true
    }

    fn step_momentum(&mut self, now: Instant) -> Option<FrameCommand> {
        let mut momentum = self.momentum?;
        if now.saturating_duration_since(momentum.last_step) < self.interval {
            return None;
        }
        momentum.value *= self.momentum_decay;
        momentum.last_step = now;
        if momentum.value.abs() <= self.momentum_threshold {
            self.momentum = None;
            return None;
        }
        self.momentum = Some(momentum);
        // One frame per step, opposite to the drag velocity like drags themselves.
        let delta = if momentum.value > 0.0 { -1 } else { 1 };
        self.direction = Direction::from_delta(delta);
        Some(FrameCommand::Step(delta))
    }

    fn emit_step(&mut self, delta: i64, now: Instant) -> FrameCommand {
        self.direction = Direction::from_delta(delta);
        let command = FrameCommand::Step(delta);
        self.limiter.submit(command, now);
        command
    }
}
